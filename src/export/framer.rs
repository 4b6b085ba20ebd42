//! Two-pass viewport framing.
//!
//! Edge labels are laid out in screen pixels, so their size in document
//! space depends on the zoom. The first pass fits the content, the second
//! refits once labels have been measured at that zoom. Each pass is applied
//! to the host and followed by a short settle delay so layout can reflow.

use std::time::Duration;

use crate::canvas::{CanvasDocument, Edge, ElementRef};
use crate::geometry::{combine, fit_aspect, fit_dimensions, scale, BoundingBox};
use crate::{Error, Result, SurfaceSize, Viewport};

/// Pan/zoom that fits one box into the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub viewport: Viewport,
    /// Target box after extension to the surface aspect ratio
    pub fitted: BoundingBox,
}

/// Compute the viewport that shows `target` in `surface`.
///
/// The zoom is not clamped to 100%: an export may zoom out as far as needed.
/// The box is extended from its top-left corner so the anchor point stays
/// put between passes.
pub fn plan_frame(target: &BoundingBox, surface: SurfaceSize) -> Result<FramePlan> {
    if surface.width == 0 || surface.height == 0 {
        return Err(Error::DegenerateGeometry(format!(
            "render surface is {}x{}",
            surface.width, surface.height
        )));
    }
    // Also rejects NaN and the inverted box produced by combining nothing.
    if !target.has_area() {
        return Err(Error::DegenerateGeometry(format!(
            "target box {:?} has no area",
            target
        )));
    }

    let ratio = (target.width() / surface.width as f64)
        .max(target.height() / surface.height as f64);
    let fitted = fit_aspect(target, surface.aspect());
    let (cx, cy) = fitted.center();
    Ok(FramePlan {
        viewport: Viewport::from_scale(cx, cy, 1.0 / ratio),
        fitted,
    })
}

/// Result of framing: the applied viewport and the capture size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub viewport: Viewport,
    /// Content plus measured labels, in document space
    pub content: BoundingBox,
    pub width: u32,
    pub height: u32,
}

pub struct ViewportFramer<'a> {
    doc: &'a dyn CanvasDocument,
    settle: Duration,
    label_padding: f64,
}

impl<'a> ViewportFramer<'a> {
    pub fn new(doc: &'a dyn CanvasDocument, settle: Duration, label_padding: f64) -> Self {
        Self { doc, settle, label_padding }
    }

    /// Frame `content` (enlarged by `content_padding`) and every edge label.
    pub async fn frame(
        &self,
        content: &BoundingBox,
        content_padding: f64,
        edges: &[Edge],
    ) -> Result<Framing> {
        let surface = self.doc.surface().size();

        let working = scale(content, content_padding);
        let first = plan_frame(&working, surface)?;
        log::debug!(
            "{}: first pass zoom {:.4} at ({:.1}, {:.1})",
            self.doc.id(),
            first.viewport.tz,
            first.viewport.tx,
            first.viewport.ty
        );
        self.apply(first.viewport).await;

        // Always refit, even without labels: measuring is what tells us.
        let labels = self.measure_labels(edges);
        let working = combine(std::iter::once(working).chain(labels.iter().copied()));
        let second = plan_frame(&working, surface)?;
        log::debug!(
            "{}: second pass with {} label(s), zoom {:.4}",
            self.doc.id(),
            labels.len(),
            second.viewport.tz
        );
        self.apply(second.viewport).await;

        let viewport = self.doc.viewport();
        let on_screen = viewport.to_screen(&working, surface);
        let (w, h) = fit_dimensions(on_screen.width(), on_screen.height(), surface.aspect());
        Ok(Framing {
            viewport,
            content: working,
            width: w.round() as u32,
            height: h.round() as u32,
        })
    }

    async fn apply(&self, viewport: Viewport) {
        self.doc.set_viewport(viewport);
        tokio::time::sleep(self.settle).await;
    }

    /// Document-space boxes of all edge labels at the current zoom, padded.
    pub fn measure_labels(&self, edges: &[Edge]) -> Vec<BoundingBox> {
        let surface = self.doc.surface();
        let size = surface.size();
        let viewport = self.doc.viewport();
        edges
            .iter()
            .filter(|e| e.label.is_some())
            .filter_map(|e| {
                surface.measure_bounding_box(&ElementRef::edge_label(self.doc.id(), &e.id))
            })
            .map(|screen| scale(&viewport.to_document(&screen, size), self.label_padding))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::memory::{MemoryCanvas, LABEL_HEIGHT_PX};
    use crate::canvas::{CanvasModel, Node};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn square_node_in_square_surface() {
        let w = 200.0;
        let surface = SurfaceSize { width: 500, height: 500 };
        let node = BoundingBox::from_rect(0.0, 0.0, w, w);
        let plan = plan_frame(&scale(&node, 1.1), surface).expect("plan");
        assert!(close(plan.viewport.scale(), 500.0 / (w * 1.1)));
        assert!(close(plan.viewport.tx, 100.0));
        assert!(close(plan.viewport.ty, 100.0));
    }

    #[test]
    fn zoom_is_not_clamped() {
        let surface = SurfaceSize { width: 100, height: 100 };
        let wide = BoundingBox::from_rect(0.0, 0.0, 10_000.0, 10.0);
        let plan = plan_frame(&wide, surface).expect("plan");
        assert!(close(plan.viewport.scale(), 0.01));
        // tiny content zooms in past 100%
        let tiny = BoundingBox::from_rect(0.0, 0.0, 10.0, 10.0);
        let plan = plan_frame(&tiny, surface).expect("plan");
        assert!(close(plan.viewport.scale(), 10.0));
    }

    #[test]
    fn extension_keeps_top_left() {
        let surface = SurfaceSize { width: 400, height: 200 };
        let target = BoundingBox::from_rect(10.0, 20.0, 100.0, 100.0);
        let plan = plan_frame(&target, surface).expect("plan");
        assert_eq!(plan.fitted, BoundingBox::from_rect(10.0, 20.0, 200.0, 100.0));
        assert!(close(plan.viewport.tx, 110.0));
        assert!(close(plan.viewport.ty, 70.0));
    }

    #[test]
    fn degenerate_targets_fail_fast() {
        let surface = SurfaceSize { width: 100, height: 100 };
        for b in [
            BoundingBox::from_rect(0.0, 0.0, 0.0, 10.0),
            BoundingBox::from_rect(0.0, 0.0, 10.0, 0.0),
            BoundingBox::EMPTY,
            BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0),
        ] {
            assert!(matches!(plan_frame(&b, surface), Err(Error::DegenerateGeometry(_))));
        }
        let zero = SurfaceSize { width: 0, height: 100 };
        assert!(plan_frame(&BoundingBox::from_rect(0.0, 0.0, 1.0, 1.0), zero).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn second_pass_makes_room_for_labels() {
        let model = CanvasModel {
            nodes: vec![
                Node::new("a", 0.0, 0.0, 100.0, 100.0),
                Node::new("b", 4000.0, 0.0, 100.0, 100.0),
            ],
            edges: vec![Edge::new("e", "a", "b").with_label("a rather long edge label")],
        };
        let c = MemoryCanvas::new("c", model, SurfaceSize { width: 400, height: 400 });
        let framer = ViewportFramer::new(&c, Duration::from_millis(10), 1.1);
        let content = BoundingBox::new(0.0, 0.0, 4100.0, 100.0);
        let framing = framer.frame(&content, 1.1, &c.edges()).await.expect("frame");

        assert_eq!(c.viewport_writes(), 2);
        // at ~0.09 zoom a 20px label is ~220 document units tall
        let label_doc_height = LABEL_HEIGHT_PX / framing.viewport.scale();
        assert!(framing.content.height() > label_doc_height);
        assert_eq!((framing.width, framing.height), (400, 400));
    }

    #[tokio::test(start_paused = true)]
    async fn second_pass_runs_without_labels() {
        let model = CanvasModel {
            nodes: vec![Node::new("a", 0.0, 0.0, 100.0, 50.0)],
            edges: vec![],
        };
        let c = MemoryCanvas::new("c", model, SurfaceSize { width: 300, height: 200 });
        let framer = ViewportFramer::new(&c, Duration::from_millis(10), 1.1);
        let framing = framer
            .frame(&BoundingBox::from_rect(0.0, 0.0, 100.0, 50.0), 1.1, &[])
            .await
            .expect("frame");
        assert_eq!(c.viewport_writes(), 2);
        assert_eq!((framing.width, framing.height), (300, 200));
    }
}
