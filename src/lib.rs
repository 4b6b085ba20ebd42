//! Canvasshot
//!
//! Export a live node-and-edge canvas document to a single PNG that frames
//! everything visible: nodes, edges and edge labels.
//!
//! # Features
//!
//! - **Two-pass framing**: a coarse fit, then a refit once edge labels have
//!   been measured at the chosen zoom
//! - **Render gating**: capture waits until every node reports mounted
//! - **Scoped capture**: only elements of the exported canvas reach the rasterizer
//! - **Always restores**: viewport, selection and export flags are put back on
//!   every exit path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use canvasshot::canvas::{json, memory::{MemoryCanvas, MemoryRegistry}};
//! use canvasshot::{ExportConfig, ExportRequest, SurfaceSize};
//!
//! # async fn run() -> canvasshot::Result<()> {
//! let model = json::from_str("board", r#"{"nodes":[{"id":"a","type":"text","text":"hi","x":0,"y":0,"width":200,"height":80}],"edges":[]}"#)?;
//! let surface = SurfaceSize { width: 1280, height: 720 };
//! let canvas = Arc::new(MemoryCanvas::new("board", model, surface));
//! let registry = Arc::new(MemoryRegistry::new().with_canvas(canvas));
//!
//! let image = canvasshot::export_canvas(
//!     registry,
//!     &ExportRequest::new("board"),
//!     ExportConfig::default(),
//! )
//! .await?;
//! std::fs::write("board.png", &image.bytes)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use base64::Engine as Base64Engine;
use sha2::{Digest, Sha256};

pub mod error;
pub use error::{Error, ErrorCategory, Result};

pub mod geometry;
pub use geometry::BoundingBox;

// Host-facing document model and capability traits
pub mod canvas;

// Export pipeline: bounds, framing, readiness, filtering, orchestration
pub mod export;
pub use export::{ExportPhase, Exporter};

// Paint commands and the tiny-skia rasterizer used by the in-memory surface
pub mod rendering;

/// Configuration for canvas export
///
/// The defaults match interactive hosts: a one second settle before framing,
/// 10ms reflow delays, 10ms readiness polling and a 15 second ceiling.
///
/// # Examples
///
/// ```
/// let cfg = canvasshot::ExportConfig::default();
/// assert_eq!(cfg.max_wait_ms, 15000);
/// ```
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Wait before framing starts, unless a request overrides it
    pub initial_settle_ms: u64,
    /// Delay after each viewport change before anything is measured
    pub settle_delay_ms: u64,
    /// Readiness polling interval
    pub poll_interval_ms: u64,
    /// Longest time to wait for nodes to mount
    pub max_wait_ms: u64,
    /// Enlargement applied around the content box before the first fit
    pub content_padding: f64,
    /// Enlargement applied around each measured edge label
    pub label_padding: f64,
    /// Device pixels per CSS pixel in the produced image
    pub pixel_ratio: f32,
    /// Background override; the surface colour is used when `None`
    pub background: Option<Rgba>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            initial_settle_ms: 1000,
            settle_delay_ms: 10,
            poll_interval_ms: 10,
            max_wait_ms: 15000,
            content_padding: 1.1,
            label_padding: 1.1,
            pixel_ratio: 1.0,
            background: None,
        }
    }
}

/// One export request
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Which open canvas to export
    pub document_id: String,
    /// Overrides [`ExportConfig::initial_settle_ms`]
    pub settle_timeout_ms: Option<u64>,
}

impl ExportRequest {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            settle_timeout_ms: None,
        }
    }

    pub fn with_settle_timeout(mut self, ms: u64) -> Self {
        self.settle_timeout_ms = Some(ms);
        self
    }
}

/// Pan and zoom of a canvas.
///
/// `(tx, ty)` is the document point shown at the centre of the surface and
/// `tz` is the zoom stored as `log2` of the linear scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { tx: 0.0, ty: 0.0, tz: 0.0 }
    }
}

impl Viewport {
    pub fn from_scale(tx: f64, ty: f64, scale: f64) -> Self {
        Self { tx, ty, tz: scale.log2() }
    }

    /// Linear scale (screen pixels per document unit)
    pub fn scale(&self) -> f64 {
        self.tz.exp2()
    }

    /// Map a document-space box to surface pixels.
    pub fn to_screen(&self, bbox: &BoundingBox, surface: SurfaceSize) -> BoundingBox {
        let s = self.scale();
        let (hw, hh) = (surface.width as f64 / 2.0, surface.height as f64 / 2.0);
        BoundingBox::new(
            (bbox.min_x - self.tx) * s + hw,
            (bbox.min_y - self.ty) * s + hh,
            (bbox.max_x - self.tx) * s + hw,
            (bbox.max_y - self.ty) * s + hh,
        )
    }

    /// Map a surface-pixel box back to document space.
    pub fn to_document(&self, bbox: &BoundingBox, surface: SurfaceSize) -> BoundingBox {
        let s = self.scale();
        let (hw, hh) = (surface.width as f64 / 2.0, surface.height as f64 / 2.0);
        BoundingBox::new(
            (bbox.min_x - hw) / s + self.tx,
            (bbox.min_y - hh) / s + self.ty,
            (bbox.max_x - hw) / s + self.tx,
            (bbox.max_y - hh) / s + self.ty,
        )
    }
}

/// Pixel size of the visible render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl SurfaceSize {
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        let digit = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();
        match s.len() {
            3 => {
                let mut it = s.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Rgba::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Rgba::rgb(digit(0)?, digit(2)?, digit(4)?)),
            8 => Some(Rgba {
                r: digit(0)?,
                g: digit(2)?,
                b: digit(4)?,
                a: digit(6)?,
            }),
            _ => None,
        }
    }
}

/// A successful export
#[derive(Debug, Clone)]
pub struct CanvasImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Always `image/png`
    pub mime_type: &'static str,
    /// Capture width in CSS pixels (before the pixel ratio)
    pub width: u32,
    /// Capture height in CSS pixels (before the pixel ratio)
    pub height: u32,
}

impl CanvasImage {
    pub const PNG: &'static str = "image/png";

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Export one canvas with a throwaway [`Exporter`].
///
/// Use an [`Exporter`] directly to share the in-flight guard between
/// concurrent requests or to observe phase transitions.
pub async fn export_canvas(
    registry: Arc<dyn canvas::DocumentRegistry>,
    request: &ExportRequest,
    config: ExportConfig,
) -> Result<CanvasImage> {
    Exporter::new(registry, config).export(request).await
}
