//! Rasterizer: paint commands to PNG via tiny-skia

use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::rendering::paint::PaintCommand;
use crate::rendering::Screenshot;
use crate::{Error, Result, Rgba};

/// Largest edge, in device pixels, the rasterizer will allocate.
pub const MAX_DIMENSION: u32 = 16384;

/// Render `commands` (in surface pixels) onto a `width` x `height` image
/// scaled by `pixel_ratio`, then encode it as PNG.
pub fn rasterize(
    width: u32,
    height: u32,
    pixel_ratio: f32,
    background: Rgba,
    commands: &[PaintCommand],
) -> Result<Screenshot> {
    if !(pixel_ratio.is_finite() && pixel_ratio > 0.0) {
        return Err(Error::CaptureFailed(format!("invalid pixel ratio {}", pixel_ratio)));
    }
    let dev_w = (width as f32 * pixel_ratio).round() as u32;
    let dev_h = (height as f32 * pixel_ratio).round() as u32;
    if dev_w > MAX_DIMENSION || dev_h > MAX_DIMENSION {
        return Err(Error::CaptureFailed(format!(
            "capture of {}x{} exceeds the {}px limit",
            dev_w, dev_h, MAX_DIMENSION
        )));
    }
    let mut pixmap = Pixmap::new(dev_w, dev_h).ok_or_else(|| {
        Error::CaptureFailed(format!("cannot allocate {}x{} pixmap", dev_w, dev_h))
    })?;
    pixmap.fill(to_color(background));

    let transform = Transform::from_scale(pixel_ratio, pixel_ratio);
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => {
                // Zero-sized or non-finite rects have nothing to paint.
                if let Some(rect) = Rect::from_xywh(*x, *y, *width, *height) {
                    pixmap.fill_rect(rect, &paint_for(*rgba), transform, None);
                }
            }
            PaintCommand::StrokeRect { x, y, width, height, line_width, rgba } => {
                if let Some(rect) = Rect::from_xywh(*x, *y, *width, *height) {
                    let path = PathBuilder::from_rect(rect);
                    let stroke = Stroke { width: *line_width, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint_for(*rgba), &stroke, transform, None);
                }
            }
            PaintCommand::Line { from, to, line_width, rgba } => {
                let mut pb = PathBuilder::new();
                pb.move_to(from.0, from.1);
                pb.line_to(to.0, to.1);
                if let Some(path) = pb.finish() {
                    let stroke = Stroke { width: *line_width, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint_for(*rgba), &stroke, transform, None);
                }
            }
        }
    }

    let png_data = pixmap
        .encode_png()
        .map_err(|e| Error::CaptureFailed(format!("PNG encoding failed: {}", e)))?;
    Ok(Screenshot { width: dev_w, height: dev_h, png_data })
}

fn to_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn paint_for(c: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_color(c));
    paint.anti_alias = true;
    paint
}
