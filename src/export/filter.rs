//! Which rendered elements take part in a capture.
//!
//! Several canvases (and overlays) can share one render tree. The filter
//! only admits graph elements it knows belong to the exported document and
//! lets everything that is not a graph element through.

use std::collections::HashSet;

use crate::canvas::{Edge, ElementKind, ElementRef, Node};

#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    nodes: HashSet<ElementRef>,
    edges: HashSet<ElementRef>,
    labels: HashSet<ElementRef>,
}

impl ElementFilter {
    pub fn new<N, E, L>(nodes: N, edges: E, labels: L) -> Self
    where
        N: IntoIterator<Item = ElementRef>,
        E: IntoIterator<Item = ElementRef>,
        L: IntoIterator<Item = ElementRef>,
    {
        Self {
            nodes: nodes.into_iter().collect(),
            edges: edges.into_iter().collect(),
            labels: labels.into_iter().collect(),
        }
    }

    /// Known elements of one canvas: its nodes, edge paths and arrows, and
    /// the labels of labelled edges.
    pub fn for_document(canvas: &str, nodes: &[Node], edges: &[Edge]) -> Self {
        Self::new(
            nodes.iter().map(|n| ElementRef::node(canvas, &n.id)),
            edges.iter().flat_map(|e| {
                [
                    ElementRef::edge_path(canvas, &e.id),
                    ElementRef::edge_arrow(canvas, &e.id),
                ]
            }),
            edges
                .iter()
                .filter(|e| e.label.is_some())
                .map(|e| ElementRef::edge_label(canvas, &e.id)),
        )
    }

    pub fn accepts(&self, element: &ElementRef) -> bool {
        match element.kind {
            ElementKind::Node => self.nodes.contains(element),
            ElementKind::EdgePath | ElementKind::EdgeArrow => self.edges.contains(element),
            ElementKind::EdgeLabel => self.labels.contains(element),
            ElementKind::Chrome => true,
        }
    }
}
