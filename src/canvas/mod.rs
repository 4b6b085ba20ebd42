//! Canvas document model and the host capabilities the exporter consumes.
//!
//! A host exposes its open documents through [`DocumentRegistry`], each
//! canvas through [`CanvasDocument`], and its live rendering through
//! [`RenderSurface`]. Edges refer to nodes by [`NodeId`] only; resolve them
//! through the document.

pub mod json;
pub mod memory;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::geometry::BoundingBox;
use crate::{Error, Result, Rgba, SurfaceSize, Viewport};

/// Identity of a node within one canvas
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

/// Identity of an edge within one canvas
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        EdgeId(s.to_string())
    }
}

/// What a node shows
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Text(String),
    File(String),
    Link(String),
    Group { label: Option<String> },
    Other(String),
}

/// Node colour as stored in the document: a preset index or an explicit colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasColor {
    Preset(u8),
    Custom(Rgba),
}

impl CanvasColor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            p @ ("1" | "2" | "3" | "4" | "5" | "6") => p.parse().ok().map(CanvasColor::Preset),
            other => Rgba::from_hex(other).map(CanvasColor::Custom),
        }
    }

    pub fn to_rgba(self) -> Rgba {
        match self {
            CanvasColor::Preset(1) => Rgba::rgb(0xe9, 0x3d, 0x4b),
            CanvasColor::Preset(2) => Rgba::rgb(0xe9, 0x97, 0x3f),
            CanvasColor::Preset(3) => Rgba::rgb(0xe0, 0xde, 0x71),
            CanvasColor::Preset(4) => Rgba::rgb(0x44, 0xcf, 0x6e),
            CanvasColor::Preset(5) => Rgba::rgb(0x53, 0xdf, 0xdd),
            CanvasColor::Preset(6) => Rgba::rgb(0xa8, 0x82, 0xff),
            CanvasColor::Preset(_) => Rgba::rgb(0x7f, 0x7f, 0x7f),
            CanvasColor::Custom(c) => c,
        }
    }
}

/// One node as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: NodeKind,
    pub color: Option<CanvasColor>,
    /// The node's view has been created
    pub initialized: bool,
    /// The node's content finished loading
    pub mounted: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: NodeId(id.into()),
            x,
            y,
            width,
            height,
            kind: NodeKind::Text(String::new()),
            color: None,
            initialized: true,
            mounted: true,
        }
    }

    /// The plain coordinate rectangle
    pub fn rect(&self) -> BoundingBox {
        BoundingBox::from_rect(self.x, self.y, self.width, self.height)
    }

    pub fn is_ready(&self) -> bool {
        self.initialized && self.mounted
    }
}

/// Side of a node an edge attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Side::Top),
            "right" => Some(Side::Right),
            "bottom" => Some(Side::Bottom),
            "left" => Some(Side::Left),
            _ => None,
        }
    }
}

/// One edge as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub from_side: Option<Side>,
    pub to_side: Option<Side>,
    pub label: Option<String>,
    pub color: Option<CanvasColor>,
}

impl Edge {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: EdgeId(id.into()),
            from: NodeId(from.into()),
            to: NodeId(to.into()),
            from_side: None,
            to_side: None,
            label: None,
            color: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Nodes and edges of one canvas, as stored in a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasModel {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CanvasModel {
    /// Check the structural invariants: non-negative sizes and edges that
    /// only reference nodes present in the model.
    pub fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for n in &self.nodes {
            if n.width < 0.0 || n.height < 0.0 {
                return Err(Error::Parse(format!(
                    "node {} has negative size {}x{}",
                    n.id, n.width, n.height
                )));
            }
            if !ids.insert(&n.id) {
                return Err(Error::Parse(format!("duplicate node id {}", n.id)));
            }
        }
        if let Some(e) = dangling_edge(&self.edges, |id| ids.contains(id)) {
            return Err(Error::Parse(format!(
                "edge {} references unknown node ({} -> {})",
                e.id, e.from, e.to
            )));
        }
        Ok(())
    }
}

/// First edge whose endpoints are not both known.
pub fn dangling_edge<'a, F>(edges: &'a [Edge], known: F) -> Option<&'a Edge>
where
    F: Fn(&NodeId) -> bool,
{
    edges.iter().find(|e| !known(&e.from) || !known(&e.to))
}

/// Currently selected node and edge ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(pub BTreeSet<String>);

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Selection(iter.into_iter().map(Into::into).collect())
    }
}

/// Export flags a canvas carries while it is being captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportMode {
    /// Export in progress
    pub exporting: bool,
    /// Export-only styling applied (hidden chrome, no hover states)
    pub styled: bool,
}

/// Kind of a rendered element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    EdgePath,
    EdgeArrow,
    EdgeLabel,
    /// Anything that is not part of a canvas graph
    Chrome,
}

/// Handle to one element in the host's render tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub kind: ElementKind,
    /// Owning canvas document id (empty for chrome)
    pub canvas: String,
    pub id: String,
}

impl ElementRef {
    pub fn node(canvas: &str, id: &NodeId) -> Self {
        Self {
            kind: ElementKind::Node,
            canvas: canvas.to_string(),
            id: id.0.clone(),
        }
    }

    pub fn edge_path(canvas: &str, id: &EdgeId) -> Self {
        Self {
            kind: ElementKind::EdgePath,
            canvas: canvas.to_string(),
            id: id.0.clone(),
        }
    }

    pub fn edge_arrow(canvas: &str, id: &EdgeId) -> Self {
        Self {
            kind: ElementKind::EdgeArrow,
            canvas: canvas.to_string(),
            id: id.0.clone(),
        }
    }

    pub fn edge_label(canvas: &str, id: &EdgeId) -> Self {
        Self {
            kind: ElementKind::EdgeLabel,
            canvas: canvas.to_string(),
            id: id.0.clone(),
        }
    }

    pub fn chrome(id: &str) -> Self {
        Self {
            kind: ElementKind::Chrome,
            canvas: String::new(),
            id: id.to_string(),
        }
    }
}

/// Parameters handed to the rasterizer for one capture
pub struct CaptureOptions<'a> {
    pub pixel_ratio: f32,
    /// Capture width in surface pixels
    pub width: u32,
    /// Capture height in surface pixels
    pub height: u32,
    pub background: Rgba,
    /// Elements for which this returns `false` are left out of the image
    pub filter: &'a (dyn Fn(&ElementRef) -> bool + Send + Sync),
}

/// Live rendering of a canvas: measurement and capture.
pub trait RenderSurface: Send + Sync {
    /// Visible area in pixels
    fn size(&self) -> SurfaceSize;

    /// On-screen box of a rendered element, if it is laid out
    fn measure_bounding_box(&self, element: &ElementRef) -> Option<BoundingBox>;

    fn computed_background_color(&self) -> Rgba;

    /// Rasterize the surface root, skipping filtered elements
    fn capture_subtree(&self, options: &CaptureOptions<'_>) -> Result<Vec<u8>>;
}

/// One open canvas document.
pub trait CanvasDocument: Send + Sync {
    fn id(&self) -> &str;

    fn nodes(&self) -> Vec<Node>;

    fn node(&self, id: &NodeId) -> Option<Node> {
        self.nodes().into_iter().find(|n| &n.id == id)
    }

    fn edges(&self) -> Vec<Edge>;

    /// Refined document-space bounds of a node. Hosts without the query
    /// keep the default, and callers fall back to [`Node::rect`].
    fn node_bbox(&self, node: &Node) -> Result<BoundingBox> {
        Err(Error::Unsupported(format!("refined bounds for node {}", node.id)))
    }

    /// Document-space bounds of an edge, when measurable
    fn edge_bbox(&self, _edge: &Edge) -> Option<BoundingBox> {
        None
    }

    fn viewport(&self) -> Viewport;

    fn set_viewport(&self, viewport: Viewport);

    fn selection(&self) -> Selection;

    fn set_selection(&self, selection: Selection);

    fn export_mode(&self) -> ExportMode;

    fn set_export_mode(&self, mode: ExportMode);

    /// Block or unblock user interaction (pan, zoom, drag)
    fn set_interaction_blocked(&self, blocked: bool);

    fn surface(&self) -> &dyn RenderSurface;
}

/// Kind of an open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Canvas,
    Markdown,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub id: String,
    pub kind: DocumentKind,
}

/// Open documents of the host
pub trait DocumentRegistry: Send + Sync {
    fn documents(&self) -> Vec<DocumentInfo>;

    /// The canvas with this id, if one is open
    fn canvas(&self, id: &str) -> Option<Arc<dyn CanvasDocument>>;
}
