//! Content bounds of a canvas in document coordinates.

use crate::canvas::{CanvasDocument, Edge, Node};
use crate::geometry::{combine, BoundingBox};

/// One box around every node and measurable edge.
///
/// Nodes use the host's refined bounds when available and fall back to their
/// coordinate rectangle otherwise; a failing node never fails the whole pass.
/// Edges without measurable bounds are skipped, since they normally run
/// between nodes that are already covered.
pub fn content_bounds(doc: &dyn CanvasDocument, nodes: &[Node], edges: &[Edge]) -> BoundingBox {
    let node_boxes = nodes.iter().map(|n| match doc.node_bbox(n) {
        Ok(b) => b,
        Err(e) => {
            log::debug!("{}: using coordinate rect for node {}: {}", doc.id(), n.id, e);
            n.rect()
        }
    });
    let edge_boxes = edges.iter().filter_map(|e| doc.edge_bbox(e));
    combine(node_boxes.chain(edge_boxes))
}
