//! Export orchestration.
//!
//! One export walks `Preparing -> Framing -> WaitingReady -> Capturing ->
//! Restoring -> Done | Failed`. Input errors are reported from `Preparing`
//! before anything on the host changes; every later failure still goes
//! through `Restoring`, which puts back the viewport, selection and export
//! flags captured at the start.

pub mod bounds;
pub mod filter;
pub mod framer;
pub mod readiness;
pub mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::canvas::{
    dangling_edge, CanvasDocument, CaptureOptions, DocumentKind, DocumentRegistry, Edge,
    ElementRef, Node,
};
use crate::{CanvasImage, Error, ExportConfig, ExportRequest, Result};

pub use filter::ElementFilter;
pub use framer::{plan_frame, FramePlan, Framing, ViewportFramer};
pub use readiness::RenderReadinessWaiter;
pub use session::ExportSession;

/// Where an export currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportPhase {
    /// No export running for the document
    #[default]
    Idle,
    Preparing,
    Framing,
    WaitingReady,
    Capturing,
    Restoring,
    Done,
    Failed,
}

impl ExportPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportPhase::Done | ExportPhase::Failed)
    }
}

type OnPhaseHandler = Arc<dyn Fn(&str, ExportPhase) + Send + Sync>;
type PhaseTable = Arc<Mutex<HashMap<String, ExportPhase>>>;

fn lock_table(table: &PhaseTable) -> MutexGuard<'_, HashMap<String, ExportPhase>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Marks a document as being exported; released on drop.
struct InFlight {
    table: PhaseTable,
    id: String,
}

impl InFlight {
    fn claim(table: &PhaseTable, id: &str) -> Result<Self> {
        let mut t = lock_table(table);
        if t.contains_key(id) {
            return Err(Error::Busy(id.to_string()));
        }
        t.insert(id.to_string(), ExportPhase::Preparing);
        Ok(Self {
            table: table.clone(),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock_table(&self.table).remove(&self.id);
    }
}

/// Everything `Preparing` hands to the later phases
struct Prepared {
    doc: Arc<dyn CanvasDocument>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    _claim: InFlight,
}

/// Exports canvases from one host.
///
/// A second export of a document that is already being exported fails with
/// [`Error::Busy`]; different documents may be exported concurrently.
pub struct Exporter {
    registry: Arc<dyn DocumentRegistry>,
    config: ExportConfig,
    phases: PhaseTable,
    on_phase: Option<OnPhaseHandler>,
}

impl Exporter {
    pub fn new(registry: Arc<dyn DocumentRegistry>, config: ExportConfig) -> Self {
        Self {
            registry,
            config,
            phases: Arc::new(Mutex::new(HashMap::new())),
            on_phase: None,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Register a callback invoked on every phase transition with the
    /// document id and the new phase.
    pub fn on_phase<F>(&mut self, cb: F)
    where
        F: Fn(&str, ExportPhase) + Send + Sync + 'static,
    {
        self.on_phase = Some(Arc::new(cb));
    }

    /// Remove previously registered on_phase callback if any
    pub fn clear_on_phase(&mut self) {
        self.on_phase = None;
    }

    /// Current phase of an export of `document_id` (`Idle` when none runs).
    pub fn phase(&self, document_id: &str) -> ExportPhase {
        lock_table(&self.phases)
            .get(document_id)
            .copied()
            .unwrap_or_default()
    }

    /// Record a phase of an export that holds the in-flight claim.
    fn emit(&self, id: &str, phase: ExportPhase) {
        if let Some(p) = lock_table(&self.phases).get_mut(id) {
            *p = phase;
        }
        self.notify(id, phase);
    }

    /// Report a phase without touching the table, which may belong to
    /// another export of the same document.
    fn notify(&self, id: &str, phase: ExportPhase) {
        log::debug!("{}: {:?}", id, phase);
        if let Some(cb) = &self.on_phase {
            cb(id, phase);
        }
    }

    /// Export the requested canvas to PNG.
    pub async fn export(&self, request: &ExportRequest) -> Result<CanvasImage> {
        let id = request.document_id.as_str();
        self.notify(id, ExportPhase::Preparing);
        let prepared = match self.prepare(id) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{}: export rejected: {}", id, e);
                self.notify(id, ExportPhase::Failed);
                return Err(e);
            }
        };
        let doc = prepared.doc.as_ref();

        let mut session = ExportSession::begin(doc);
        let outcome = self.run(request, doc, &prepared.nodes, &prepared.edges).await;
        self.emit(id, ExportPhase::Restoring);
        session.restore();

        match outcome {
            Ok(image) => {
                log::info!(
                    "{}: exported {}x{} ({} bytes)",
                    id,
                    image.width,
                    image.height,
                    image.bytes.len()
                );
                self.emit(id, ExportPhase::Done);
                Ok(image)
            }
            Err(e) => {
                log::warn!("{}: export failed: {}", id, e);
                self.emit(id, ExportPhase::Failed);
                Err(e)
            }
        }
    }

    /// Validate the target. Nothing on the host is touched here.
    fn prepare(&self, id: &str) -> Result<Prepared> {
        let info = self
            .registry
            .documents()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::InvalidTarget(format!("document {} is not open", id)))?;
        if info.kind != DocumentKind::Canvas {
            return Err(Error::InvalidTarget(format!(
                "document {} is {:?}, not a canvas",
                id, info.kind
            )));
        }
        let doc = self
            .registry
            .canvas(id)
            .ok_or_else(|| Error::InvalidTarget(format!("canvas {} is not available", id)))?;

        let nodes = doc.nodes();
        if nodes.is_empty() {
            return Err(Error::InvalidTarget(format!("canvas {} has no nodes", id)));
        }
        let edges = doc.edges();
        if let Some(e) = dangling_edge(&edges, |n| nodes.iter().any(|node| &node.id == n)) {
            return Err(Error::InvalidTarget(format!(
                "edge {} of canvas {} references a missing node",
                e.id, id
            )));
        }

        let claim = InFlight::claim(&self.phases, id)?;
        Ok(Prepared {
            doc,
            nodes,
            edges,
            _claim: claim,
        })
    }

    async fn run(
        &self,
        request: &ExportRequest,
        doc: &dyn CanvasDocument,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<CanvasImage> {
        let id = doc.id();
        let cfg = &self.config;

        let settle = request.settle_timeout_ms.unwrap_or(cfg.initial_settle_ms);
        tokio::time::sleep(Duration::from_millis(settle)).await;

        self.emit(id, ExportPhase::Framing);
        let content = bounds::content_bounds(doc, nodes, edges);
        let framer = ViewportFramer::new(
            doc,
            Duration::from_millis(cfg.settle_delay_ms),
            cfg.label_padding,
        );
        let framing = framer.frame(&content, cfg.content_padding, edges).await?;

        self.emit(id, ExportPhase::WaitingReady);
        let waiter = RenderReadinessWaiter::new(
            Duration::from_millis(cfg.poll_interval_ms),
            Duration::from_millis(cfg.max_wait_ms),
        );
        let pending = waiter.wait(doc).await;
        if !pending.is_empty() {
            return Err(Error::RenderTimeout {
                pending: pending.into_iter().map(|n| n.0).collect(),
                waited_ms: cfg.max_wait_ms,
            });
        }

        self.emit(id, ExportPhase::Capturing);
        let filter = ElementFilter::for_document(id, nodes, edges);
        let accept = |el: &ElementRef| filter.accepts(el);
        let surface = doc.surface();
        let options = CaptureOptions {
            pixel_ratio: cfg.pixel_ratio,
            width: framing.width,
            height: framing.height,
            background: cfg
                .background
                .unwrap_or_else(|| surface.computed_background_color()),
            filter: &accept,
        };
        let bytes = surface.capture_subtree(&options).map_err(|e| match e {
            Error::CaptureFailed(_) => e,
            other => Error::CaptureFailed(other.to_string()),
        })?;
        if bytes.is_empty() {
            return Err(Error::CaptureFailed("rasterizer returned no data".into()));
        }

        Ok(CanvasImage {
            bytes,
            mime_type: CanvasImage::PNG,
            width: framing.width,
            height: framing.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::memory::{MemoryCanvas, MemoryRegistry};
    use crate::canvas::{CanvasModel, NodeId};
    use crate::SurfaceSize;

    fn fast_config() -> ExportConfig {
        ExportConfig {
            initial_settle_ms: 0,
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MemoryCanvas>, Exporter) {
        let model = CanvasModel {
            nodes: vec![
                Node::new("a", 0.0, 0.0, 200.0, 100.0),
                Node::new("b", 400.0, 200.0, 200.0, 100.0),
            ],
            edges: vec![Edge::new("e", "a", "b").with_label("next")],
        };
        let surface = SurfaceSize { width: 640, height: 480 };
        let canvas = Arc::new(MemoryCanvas::new("board", model, surface));
        let registry = Arc::new(MemoryRegistry::new().with_canvas(canvas.clone()));
        (canvas, Exporter::new(registry, fast_config()))
    }

    #[tokio::test(start_paused = true)]
    async fn phases_run_in_order() {
        let (_canvas, mut exporter) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        exporter.on_phase(move |_, p| sink.lock().unwrap().push(p));

        exporter.export(&ExportRequest::new("board")).await.expect("export");
        let seen = seen.lock().unwrap();
        let (last, rest) = seen.split_last().expect("phases");
        assert!(last.is_terminal());
        assert!(rest.iter().all(|p| !p.is_terminal()));
        assert_eq!(
            *seen,
            vec![
                ExportPhase::Preparing,
                ExportPhase::Framing,
                ExportPhase::WaitingReady,
                ExportPhase::Capturing,
                ExportPhase::Restoring,
                ExportPhase::Done,
            ]
        );
        assert_eq!(exporter.phase("board"), ExportPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_callback_is_not_called() {
        let (_canvas, mut exporter) = setup();
        let calls = Arc::new(Mutex::new(0usize));
        let sink = calls.clone();
        exporter.on_phase(move |_, _| *sink.lock().unwrap() += 1);
        exporter.clear_on_phase();

        exporter.export(&ExportRequest::new("board")).await.expect("export");
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_skips_capture_but_restores() {
        let (canvas, mut exporter) = setup();
        canvas.set_node_ready(&NodeId::from("a"), false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        exporter.on_phase(move |_, p| sink.lock().unwrap().push(p));

        let err = exporter.export(&ExportRequest::new("board")).await.unwrap_err();
        assert!(matches!(err, Error::RenderTimeout { .. }));
        let seen = seen.lock().unwrap();
        assert!(!seen.contains(&ExportPhase::Capturing));
        assert_eq!(seen[seen.len() - 2..], [ExportPhase::Restoring, ExportPhase::Failed]);
        assert!(canvas.last_capture().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dangling_edge_is_invalid_target() {
        // The in-memory host does not validate, so it can hold a broken edge.
        let model = CanvasModel {
            nodes: vec![Node::new("a", 0.0, 0.0, 10.0, 10.0)],
            edges: vec![Edge::new("e", "a", "ghost")],
        };
        let canvas = Arc::new(MemoryCanvas::new("x", model, SurfaceSize::default()));
        let registry = Arc::new(MemoryRegistry::new().with_canvas(canvas.clone()));
        let exporter = Exporter::new(registry, fast_config());

        let err = exporter.export(&ExportRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
        assert_eq!(canvas.viewport_writes(), 0);
    }
}
