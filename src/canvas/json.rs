//! JSON Canvas file loading.
//!
//! Accepts the `{"nodes": [...], "edges": [...]}` layout used by `.canvas`
//! files. Unknown fields are ignored.

use std::path::Path;

use serde::Deserialize;

use super::{CanvasColor, CanvasModel, Edge, EdgeId, Node, NodeId, NodeKind, Side};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct CanvasFile {
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    edges: Vec<EdgeEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    color: Option<String>,
    text: Option<String>,
    file: Option<String>,
    url: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeEntry {
    id: String,
    from_node: String,
    to_node: String,
    from_side: Option<String>,
    to_side: Option<String>,
    label: Option<String>,
    color: Option<String>,
}

/// Parse a canvas document from a JSON string.
///
/// `name` is only used in error messages.
pub fn from_str(name: &str, json: &str) -> Result<CanvasModel> {
    let file: CanvasFile = serde_json::from_str(json)
        .map_err(|e| Error::Parse(format!("{}: {}", name, e)))?;

    let nodes = file.nodes.into_iter().map(node_from_entry).collect();
    let edges = file
        .edges
        .into_iter()
        .map(edge_from_entry)
        .collect::<Result<Vec<_>>>()?;

    let model = CanvasModel { nodes, edges };
    model.validate()?;
    log::debug!(
        "loaded canvas {}: {} nodes, {} edges",
        name,
        model.nodes.len(),
        model.edges.len()
    );
    Ok(model)
}

/// Read and parse a `.canvas` file.
pub fn from_path(path: &Path) -> Result<CanvasModel> {
    let text = std::fs::read_to_string(path)?;
    from_str(&path.display().to_string(), &text)
}

fn node_from_entry(entry: NodeEntry) -> Node {
    let kind = match entry.kind.as_str() {
        "text" => NodeKind::Text(entry.text.unwrap_or_default()),
        "file" => NodeKind::File(entry.file.unwrap_or_default()),
        "link" => NodeKind::Link(entry.url.unwrap_or_default()),
        "group" => NodeKind::Group { label: entry.label },
        other => NodeKind::Other(other.to_string()),
    };
    Node {
        id: NodeId(entry.id),
        x: entry.x,
        y: entry.y,
        width: entry.width,
        height: entry.height,
        kind,
        color: entry.color.as_deref().and_then(CanvasColor::parse),
        initialized: true,
        mounted: true,
    }
}

fn edge_from_entry(entry: EdgeEntry) -> Result<Edge> {
    let side = |s: Option<String>| -> Result<Option<Side>> {
        match s {
            None => Ok(None),
            Some(s) => Side::parse(&s)
                .map(Some)
                .ok_or_else(|| Error::Parse(format!("edge {}: unknown side {:?}", entry.id, s))),
        }
    };
    Ok(Edge {
        from_side: side(entry.from_side)?,
        to_side: side(entry.to_side)?,
        id: EdgeId(entry.id.clone()),
        from: NodeId(entry.from_node),
        to: NodeId(entry.to_node),
        label: entry.label.filter(|l| !l.trim().is_empty()),
        color: entry.color.as_deref().and_then(CanvasColor::parse),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "nodes": [
            {"id":"a","type":"text","text":"Hello","x":0,"y":0,"width":250,"height":60,"color":"1"},
            {"id":"b","type":"file","file":"notes/b.md","x":400,"y":100,"width":300,"height":200},
            {"id":"g","type":"group","label":"Cluster","x":-50,"y":-50,"width":900,"height":500,"color":"#334455"}
        ],
        "edges": [
            {"id":"e1","fromNode":"a","fromSide":"right","toNode":"b","toSide":"left","label":"links to"},
            {"id":"e2","fromNode":"b","toNode":"a","label":"  "}
        ]
    }"##;

    #[test]
    fn parses_nodes_and_edges() {
        let model = from_str("sample", SAMPLE).expect("parse");
        assert_eq!(model.nodes.len(), 3);
        assert_eq!(model.edges.len(), 2);
        assert_eq!(model.nodes[0].kind, NodeKind::Text("Hello".into()));
        assert_eq!(model.nodes[0].color, Some(CanvasColor::Preset(1)));
        assert_eq!(
            model.nodes[2].kind,
            NodeKind::Group { label: Some("Cluster".into()) }
        );
        let e1 = &model.edges[0];
        assert_eq!(e1.from_side, Some(Side::Right));
        assert_eq!(e1.to_side, Some(Side::Left));
        assert_eq!(e1.label.as_deref(), Some("links to"));
        // blank labels are treated as absent
        assert_eq!(model.edges[1].label, None);
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let json = r#"{"nodes":[{"id":"a","type":"text","x":0,"y":0,"width":1,"height":1}],
                       "edges":[{"id":"e","fromNode":"a","toNode":"zz"}]}"#;
        let err = from_str("bad", json).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("zz"));
    }

    #[test]
    fn rejects_unknown_side() {
        let json = r#"{"nodes":[{"id":"a","type":"text","x":0,"y":0,"width":1,"height":1}],
                       "edges":[{"id":"e","fromNode":"a","toNode":"a","toSide":"middle"}]}"#;
        assert!(from_str("bad", json).is_err());
    }

    #[test]
    fn empty_document_is_valid() {
        let model = from_str("empty", "{}").expect("parse");
        assert!(model.nodes.is_empty());
    }
}
