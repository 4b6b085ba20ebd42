//! In-memory host: a canvas that is its own render surface.
//!
//! `MemoryCanvas` keeps the document, viewport and selection behind a mutex
//! and lays elements out with a fixed projection, which makes it usable from
//! the CLI as well as from tests. The `set_*`/`fail_*` hooks let tests
//! simulate slow mounting, broken bounds queries and rasterizer failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    CanvasDocument, CanvasModel, CaptureOptions, DocumentInfo, DocumentKind, DocumentRegistry,
    Edge, ElementKind, ElementRef, ExportMode, Node, NodeId, NodeKind, RenderSurface, Selection,
    Side,
};
use crate::geometry::{pad, BoundingBox};
use crate::rendering::paint::PaintCommand;
use crate::rendering::raster;
use crate::{Error, Result, Rgba, SurfaceSize, Viewport};

/// Width of one label character in pixels
pub const LABEL_CHAR_PX: f64 = 7.0;
/// Horizontal padding around label text in pixels
pub const LABEL_PADDING_PX: f64 = 8.0;
/// Label height in pixels
pub const LABEL_HEIGHT_PX: f64 = 20.0;
/// Side length of an arrow head in pixels
pub const ARROW_PX: f64 = 12.0;

const DEFAULT_STROKE: Rgba = Rgba::rgb(0x7f, 0x7f, 0x7f);
const FOREIGN_FILL: Rgba = Rgba::rgb(0xc0, 0xc0, 0xc0);

struct State {
    model: CanvasModel,
    viewport: Viewport,
    selection: Selection,
    mode: ExportMode,
    interaction_blocked: bool,
    viewport_writes: usize,
    bbox_failures: HashSet<NodeId>,
    capture_failure: Option<String>,
    /// Elements of other canvases mounted in the same render tree, in screen pixels
    foreign: Vec<(ElementRef, BoundingBox)>,
    last_capture: Vec<ElementRef>,
}

/// A canvas document held entirely in memory.
pub struct MemoryCanvas {
    id: String,
    surface: SurfaceSize,
    background: Rgba,
    /// Extra margin the refined bounds query reports around each node
    node_shadow: f64,
    state: Mutex<State>,
}

impl MemoryCanvas {
    pub fn new(id: impl Into<String>, model: CanvasModel, surface: SurfaceSize) -> Self {
        Self {
            id: id.into(),
            surface,
            background: Rgba::WHITE,
            node_shadow: 0.0,
            state: Mutex::new(State {
                model,
                viewport: Viewport::default(),
                selection: Selection::default(),
                mode: ExportMode::default(),
                interaction_blocked: false,
                viewport_writes: 0,
                bbox_failures: HashSet::new(),
                capture_failure: None,
                foreign: Vec::new(),
                last_capture: Vec::new(),
            }),
        }
    }

    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    /// Report refined node bounds `margin` units larger than the node
    /// rectangle on every side, like a host that draws drop shadows.
    pub fn with_node_shadow(mut self, margin: f64) -> Self {
        self.node_shadow = margin;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flip both readiness flags of a node.
    pub fn set_node_ready(&self, id: &NodeId, ready: bool) {
        let mut st = self.lock();
        if let Some(n) = st.model.nodes.iter_mut().find(|n| &n.id == id) {
            n.initialized = ready;
            n.mounted = ready;
        }
    }

    /// Make the refined bounds query fail for one node.
    pub fn fail_node_bbox(&self, id: &NodeId) {
        self.lock().bbox_failures.insert(id.clone());
    }

    /// Make the next captures fail with `message` (`None` clears it).
    pub fn fail_capture(&self, message: Option<&str>) {
        self.lock().capture_failure = message.map(str::to_string);
    }

    /// Mount every element of `other` into this canvas's render tree.
    pub fn mount_foreign(&self, other: &MemoryCanvas) {
        if std::ptr::eq(self, other) {
            return;
        }
        let elements = other.rendered_elements();
        self.lock().foreign.extend(elements);
    }

    /// Elements painted by the most recent successful capture.
    pub fn last_capture(&self) -> Vec<ElementRef> {
        self.lock().last_capture.clone()
    }

    /// Number of `set_viewport` calls so far.
    pub fn viewport_writes(&self) -> usize {
        self.lock().viewport_writes
    }

    pub fn interaction_blocked(&self) -> bool {
        self.lock().interaction_blocked
    }

    /// Every graph element of this canvas with its on-screen box.
    pub fn rendered_elements(&self) -> Vec<(ElementRef, BoundingBox)> {
        let st = self.lock();
        let layout = Layout::new(&st, self.surface);
        let mut out = Vec::new();
        for n in &st.model.nodes {
            out.push((ElementRef::node(&self.id, &n.id), layout.node(n)));
        }
        for e in &st.model.edges {
            if let Some((a, b)) = layout.edge_points(e) {
                out.push((ElementRef::edge_path(&self.id, &e.id), points_box(a, b)));
                out.push((ElementRef::edge_arrow(&self.id, &e.id), arrow_box(b)));
                if let Some(label) = &e.label {
                    out.push((ElementRef::edge_label(&self.id, &e.id), label_box(a, b, label)));
                }
            }
        }
        out
    }
}

/// Screen-space layout of one canvas state
struct Layout<'a> {
    st: &'a State,
    surface: SurfaceSize,
}

impl<'a> Layout<'a> {
    fn new(st: &'a State, surface: SurfaceSize) -> Self {
        Self { st, surface }
    }

    fn node(&self, n: &Node) -> BoundingBox {
        self.st.viewport.to_screen(&n.rect(), self.surface)
    }

    fn find(&self, id: &NodeId) -> Option<&'a Node> {
        self.st.model.nodes.iter().find(|n| &n.id == id)
    }

    /// Document-space endpoints of an edge
    fn edge_anchors(&self, e: &Edge) -> Option<((f64, f64), (f64, f64))> {
        let from = self.find(&e.from)?;
        let to = self.find(&e.to)?;
        Some((anchor(from, e.from_side), anchor(to, e.to_side)))
    }

    /// Screen-space endpoints of an edge
    fn edge_points(&self, e: &Edge) -> Option<((f64, f64), (f64, f64))> {
        let (a, b) = self.edge_anchors(e)?;
        Some((self.point(a), self.point(b)))
    }

    fn point(&self, p: (f64, f64)) -> (f64, f64) {
        let b = self
            .st
            .viewport
            .to_screen(&BoundingBox::new(p.0, p.1, p.0, p.1), self.surface);
        (b.min_x, b.min_y)
    }
}

fn anchor(n: &Node, side: Option<Side>) -> (f64, f64) {
    let (cx, cy) = n.rect().center();
    match side {
        None => (cx, cy),
        Some(Side::Top) => (cx, n.y),
        Some(Side::Bottom) => (cx, n.y + n.height),
        Some(Side::Left) => (n.x, cy),
        Some(Side::Right) => (n.x + n.width, cy),
    }
}

fn points_box(a: (f64, f64), b: (f64, f64)) -> BoundingBox {
    BoundingBox::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
}

fn arrow_box(tip: (f64, f64)) -> BoundingBox {
    let h = ARROW_PX / 2.0;
    BoundingBox::new(tip.0 - h, tip.1 - h, tip.0 + h, tip.1 + h)
}

/// Labels keep a fixed pixel size whatever the zoom.
fn label_box(a: (f64, f64), b: (f64, f64), text: &str) -> BoundingBox {
    let (mx, my) = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    let w = text.chars().count() as f64 * LABEL_CHAR_PX + 2.0 * LABEL_PADDING_PX;
    BoundingBox::new(
        mx - w / 2.0,
        my - LABEL_HEIGHT_PX / 2.0,
        mx + w / 2.0,
        my + LABEL_HEIGHT_PX / 2.0,
    )
}

fn rect_cmds(b: &BoundingBox, fill: Rgba, border: Rgba) -> [PaintCommand; 2] {
    PaintCommand::card(
        b.min_x as f32,
        b.min_y as f32,
        b.width() as f32,
        b.height() as f32,
        fill,
        border,
    )
}

fn tint(c: Rgba, alpha: u8) -> Rgba {
    Rgba { a: alpha, ..c }
}

impl CanvasDocument for MemoryCanvas {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> Vec<Node> {
        self.lock().model.nodes.clone()
    }

    fn node(&self, id: &NodeId) -> Option<Node> {
        self.lock().model.nodes.iter().find(|n| &n.id == id).cloned()
    }

    fn edges(&self) -> Vec<Edge> {
        self.lock().model.edges.clone()
    }

    fn node_bbox(&self, node: &Node) -> Result<BoundingBox> {
        if self.lock().bbox_failures.contains(&node.id) {
            return Err(Error::Unsupported(format!("bounds query failed for node {}", node.id)));
        }
        Ok(pad(&node.rect(), self.node_shadow))
    }

    fn edge_bbox(&self, edge: &Edge) -> Option<BoundingBox> {
        let st = self.lock();
        let (a, b) = Layout::new(&st, self.surface).edge_anchors(edge)?;
        Some(points_box(a, b))
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        let mut st = self.lock();
        st.viewport = viewport;
        st.viewport_writes += 1;
    }

    fn selection(&self) -> Selection {
        self.lock().selection.clone()
    }

    fn set_selection(&self, selection: Selection) {
        self.lock().selection = selection;
    }

    fn export_mode(&self) -> ExportMode {
        self.lock().mode
    }

    fn set_export_mode(&self, mode: ExportMode) {
        self.lock().mode = mode;
    }

    fn set_interaction_blocked(&self, blocked: bool) {
        self.lock().interaction_blocked = blocked;
    }

    fn surface(&self) -> &dyn RenderSurface {
        self
    }
}

impl RenderSurface for MemoryCanvas {
    fn size(&self) -> SurfaceSize {
        self.surface
    }

    fn measure_bounding_box(&self, element: &ElementRef) -> Option<BoundingBox> {
        let st = self.lock();
        if element.canvas != self.id {
            return st
                .foreign
                .iter()
                .find(|(r, _)| r == element)
                .map(|(_, b)| *b);
        }
        let layout = Layout::new(&st, self.surface);
        match element.kind {
            ElementKind::Node => st
                .model
                .nodes
                .iter()
                .find(|n| n.id.0 == element.id)
                .map(|n| layout.node(n)),
            ElementKind::EdgePath | ElementKind::EdgeArrow | ElementKind::EdgeLabel => {
                let e = st.model.edges.iter().find(|e| e.id.0 == element.id)?;
                let (a, b) = layout.edge_points(e)?;
                match element.kind {
                    ElementKind::EdgePath => Some(points_box(a, b)),
                    ElementKind::EdgeArrow => Some(arrow_box(b)),
                    _ => e.label.as_deref().map(|l| label_box(a, b, l)),
                }
            }
            ElementKind::Chrome => None,
        }
    }

    fn computed_background_color(&self) -> Rgba {
        self.background
    }

    fn capture_subtree(&self, options: &CaptureOptions<'_>) -> Result<Vec<u8>> {
        if let Some(msg) = self.lock().capture_failure.clone() {
            return Err(Error::CaptureFailed(msg));
        }

        let mut painted = Vec::new();
        let mut groups = Vec::new();
        let mut edges = Vec::new();
        let mut cards = Vec::new();
        let mut labels = Vec::new();
        {
            let st = self.lock();
            let layout = Layout::new(&st, self.surface);
            let accept = |r: &ElementRef| (options.filter)(r);

            for n in &st.model.nodes {
                let r = ElementRef::node(&self.id, &n.id);
                if !accept(&r) {
                    continue;
                }
                let color = n.color.map(|c| c.to_rgba()).unwrap_or(DEFAULT_STROKE);
                let b = layout.node(n);
                match n.kind {
                    NodeKind::Group { .. } => {
                        groups.extend(rect_cmds(&b, tint(color, 0x20), color))
                    }
                    _ => cards.extend(rect_cmds(&b, tint(color, 0x40), color)),
                }
                painted.push(r);
            }

            for e in &st.model.edges {
                let Some((a, b)) = layout.edge_points(e) else {
                    continue;
                };
                let color = e.color.map(|c| c.to_rgba()).unwrap_or(DEFAULT_STROKE);
                let path = ElementRef::edge_path(&self.id, &e.id);
                if accept(&path) {
                    edges.push(PaintCommand::Line {
                        from: (a.0 as f32, a.1 as f32),
                        to: (b.0 as f32, b.1 as f32),
                        line_width: 2.0,
                        rgba: color,
                    });
                    painted.push(path);
                }
                let arrow = ElementRef::edge_arrow(&self.id, &e.id);
                if accept(&arrow) {
                    let ab = arrow_box(b);
                    edges.push(PaintCommand::SolidRect {
                        x: ab.min_x as f32,
                        y: ab.min_y as f32,
                        width: ab.width() as f32,
                        height: ab.height() as f32,
                        rgba: color,
                    });
                    painted.push(arrow);
                }
                if let Some(text) = &e.label {
                    let label = ElementRef::edge_label(&self.id, &e.id);
                    if accept(&label) {
                        labels.extend(rect_cmds(&label_box(a, b, text), self.background, color));
                        painted.push(label);
                    }
                }
            }

            for (r, b) in &st.foreign {
                if accept(r) {
                    cards.extend(rect_cmds(b, FOREIGN_FILL, DEFAULT_STROKE));
                    painted.push(r.clone());
                }
            }
        }

        let mut commands = groups;
        commands.extend(edges);
        commands.extend(cards);
        commands.extend(labels);

        let shot = raster::rasterize(
            options.width,
            options.height,
            options.pixel_ratio,
            options.background,
            &commands,
        )?;
        log::debug!(
            "{}: painted {} elements into {}x{}",
            self.id,
            painted.len(),
            shot.width,
            shot.height
        );
        self.lock().last_capture = painted;
        Ok(shot.png_data)
    }
}

/// Registry over in-memory canvases plus placeholder entries for other
/// document kinds.
#[derive(Default)]
pub struct MemoryRegistry {
    canvases: Vec<Arc<MemoryCanvas>>,
    others: Vec<DocumentInfo>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canvas(mut self, canvas: Arc<MemoryCanvas>) -> Self {
        self.canvases.push(canvas);
        self
    }

    pub fn with_document(mut self, id: impl Into<String>, kind: DocumentKind) -> Self {
        self.others.push(DocumentInfo { id: id.into(), kind });
        self
    }
}

impl DocumentRegistry for MemoryRegistry {
    fn documents(&self) -> Vec<DocumentInfo> {
        self.canvases
            .iter()
            .map(|c| DocumentInfo {
                id: c.id.clone(),
                kind: DocumentKind::Canvas,
            })
            .chain(self.others.iter().cloned())
            .collect()
    }

    fn canvas(&self, id: &str) -> Option<Arc<dyn CanvasDocument>> {
        self.canvases
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.clone() as Arc<dyn CanvasDocument>)
    }
}
