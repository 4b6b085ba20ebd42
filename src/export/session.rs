//! Per-export snapshot of host state, restored on every exit path.

use crate::canvas::{CanvasDocument, ExportMode, Selection};
use crate::Viewport;

/// State owned by one export of one document.
///
/// [`ExportSession::begin`] snapshots the viewport and selection, blocks
/// interaction, raises the export flags and clears the selection.
/// [`ExportSession::restore`] undoes all of it; if the session is dropped
/// without an explicit restore (error, panic, cancelled future) `Drop` does
/// it instead. Either way it runs exactly once.
pub struct ExportSession<'a> {
    doc: &'a dyn CanvasDocument,
    original_viewport: Viewport,
    original_selection: Selection,
    exporting: bool,
    styled: bool,
    restored: bool,
}

impl<'a> ExportSession<'a> {
    pub fn begin(doc: &'a dyn CanvasDocument) -> Self {
        let mut session = Self {
            doc,
            original_viewport: doc.viewport(),
            original_selection: doc.selection(),
            exporting: false,
            styled: false,
            restored: false,
        };
        doc.set_interaction_blocked(true);
        session.exporting = true;
        session.styled = true;
        session.write_mode();
        doc.set_selection(Selection::default());
        session
    }

    pub fn original_viewport(&self) -> Viewport {
        self.original_viewport
    }

    pub fn original_selection(&self) -> &Selection {
        &self.original_selection
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    fn write_mode(&self) {
        self.doc.set_export_mode(ExportMode {
            exporting: self.exporting,
            styled: self.styled,
        });
    }

    /// Put the host back the way it was. Later calls are no-ops.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;

        self.exporting = false;
        self.write_mode();
        self.doc.set_interaction_blocked(false);
        self.doc.set_selection(std::mem::take(&mut self.original_selection));
        // Only write when framing moved it, so an export that failed before
        // framing leaves the viewport untouched.
        if self.doc.viewport() != self.original_viewport {
            self.doc.set_viewport(self.original_viewport);
        }
        self.styled = false;
        self.write_mode();
    }
}

impl Drop for ExportSession<'_> {
    fn drop(&mut self) {
        if !self.restored {
            log::warn!("{}: export abandoned, restoring canvas state", self.doc.id());
            self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::memory::MemoryCanvas;
    use crate::canvas::{CanvasModel, Node};
    use crate::SurfaceSize;

    fn canvas() -> MemoryCanvas {
        let model = CanvasModel {
            nodes: vec![Node::new("a", 0.0, 0.0, 10.0, 10.0)],
            edges: vec![],
        };
        let c = MemoryCanvas::new("c", model, SurfaceSize::default());
        c.set_viewport(Viewport { tx: 12.0, ty: -3.0, tz: 0.5 });
        c.set_selection(["a"].into_iter().collect());
        c
    }

    #[test]
    fn begin_sets_flags_and_clears_selection() {
        let c = canvas();
        let s = ExportSession::begin(&c);
        assert!(c.selection().is_empty());
        assert!(c.interaction_blocked());
        assert_eq!(c.export_mode(), ExportMode { exporting: true, styled: true });
        assert_eq!(s.original_selection().0.len(), 1);
        drop(s);
    }

    #[test]
    fn restore_puts_everything_back_once() {
        let c = canvas();
        let before = (c.viewport(), c.selection());
        let mut s = ExportSession::begin(&c);
        assert_eq!(s.original_viewport(), before.0);
        c.set_viewport(Viewport { tx: 0.0, ty: 0.0, tz: -4.0 });
        assert!(!s.is_restored());
        s.restore();
        assert!(s.is_restored());
        let writes = c.viewport_writes();
        s.restore();
        drop(s);

        assert_eq!((c.viewport(), c.selection()), before);
        assert_eq!(c.export_mode(), ExportMode::default());
        assert!(!c.interaction_blocked());
        assert_eq!(c.viewport_writes(), writes);
    }

    #[test]
    fn drop_restores() {
        let c = canvas();
        let before = c.viewport();
        {
            let _s = ExportSession::begin(&c);
            c.set_viewport(Viewport::default());
        }
        assert_eq!(c.viewport(), before);
        assert!(!c.export_mode().exporting);
    }

    #[test]
    fn unchanged_viewport_is_not_rewritten() {
        let c = canvas();
        let writes = c.viewport_writes();
        ExportSession::begin(&c).restore();
        assert_eq!(c.viewport_writes(), writes);
    }
}
