//! Small paint command set produced from rendered canvas elements

use crate::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rgba: Rgba,
    },
    /// Rectangle outline
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
        rgba: Rgba,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        line_width: f32,
        rgba: Rgba,
    },
}

impl PaintCommand {
    /// Filled rectangle with an outline, the usual look of a node card.
    pub fn card(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Rgba,
        border: Rgba,
    ) -> [PaintCommand; 2] {
        [
            PaintCommand::SolidRect { x, y, width, height, rgba: fill },
            PaintCommand::StrokeRect { x, y, width, height, line_width: 2.0, rgba: border },
        ]
    }
}
