//! Axis-aligned bounding boxes and the pure operations used for framing.
//!
//! None of these functions validate their input. NaN and infinite
//! coordinates flow through unchanged so that malformed upstream geometry
//! shows up in the result instead of being quietly clamped away.

/// An axis-aligned rectangle given by its extremes.
///
/// A box produced by [`combine`] over zero inputs is *degenerate*
/// (`min = +inf`, `max = -inf`); check [`BoundingBox::is_valid`] before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// The identity element of [`combine`].
    pub const EMPTY: BoundingBox = BoundingBox {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Box covering the rectangle at `(x, y)` with the given size.
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// True when the box is finite and `min <= max` on both axes.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// True when the box is valid and has positive area.
    pub fn has_area(&self) -> bool {
        self.is_valid() && self.width() > 0.0 && self.height() > 0.0
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: nan_min(self.min_x, other.min_x),
            min_y: nan_min(self.min_y, other.min_y),
            max_x: nan_max(self.max_x, other.max_x),
            max_y: nan_max(self.max_y, other.max_y),
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

// `f64::min`/`max` drop NaN operands; these keep them.
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || a < b {
        a
    } else {
        b
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || a > b {
        a
    } else {
        b
    }
}

/// Smallest box containing every input. Empty input yields [`BoundingBox::EMPTY`].
pub fn combine<I>(boxes: I) -> BoundingBox
where
    I: IntoIterator<Item = BoundingBox>,
{
    boxes
        .into_iter()
        .fold(BoundingBox::EMPTY, |acc, b| acc.union(&b))
}

/// Grow or shrink a box around its own centre.
pub fn scale(bbox: &BoundingBox, factor: f64) -> BoundingBox {
    let (cx, cy) = bbox.center();
    let half_w = bbox.width() * factor / 2.0;
    let half_h = bbox.height() * factor / 2.0;
    BoundingBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

/// Expand a box by `margin` on all four sides.
pub fn pad(bbox: &BoundingBox, margin: f64) -> BoundingBox {
    BoundingBox::new(
        bbox.min_x - margin,
        bbox.min_y - margin,
        bbox.max_x + margin,
        bbox.max_y + margin,
    )
}

/// Extend `width`/`height` along one axis until `width / height == aspect`.
///
/// Never shrinks: the axis that is already too long relative to the target
/// ratio is kept and the other one grows.
pub fn fit_dimensions(width: f64, height: f64, aspect: f64) -> (f64, f64) {
    if width / height > aspect {
        (width, width / aspect)
    } else {
        (height * aspect, height)
    }
}

/// Extend a box to the given aspect ratio, keeping its top-left corner fixed.
pub fn fit_aspect(bbox: &BoundingBox, aspect: f64) -> BoundingBox {
    let (w, h) = fit_dimensions(bbox.width(), bbox.height(), aspect);
    BoundingBox::from_rect(bbox.min_x, bbox.min_y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BoundingBox {
        BoundingBox::new(-10.0, 5.0, 30.0, 25.0)
    }

    #[test]
    fn combine_empty_is_degenerate() {
        let b = combine(std::iter::empty());
        assert_eq!(b.min_x, f64::INFINITY);
        assert_eq!(b.min_y, f64::INFINITY);
        assert_eq!(b.max_x, f64::NEG_INFINITY);
        assert_eq!(b.max_y, f64::NEG_INFINITY);
        assert!(!b.is_valid());
    }

    #[test]
    fn combine_single_is_identity() {
        assert_eq!(combine([sample()]), sample());
    }

    #[test]
    fn combine_covers_all_inputs() {
        let b = combine([
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(-5.0, 3.0, 2.0, 40.0),
        ]);
        assert_eq!(b, BoundingBox::new(-5.0, 0.0, 10.0, 40.0));
    }

    #[test]
    fn combine_propagates_nan() {
        let b = combine([sample(), BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0)]);
        assert!(b.min_x.is_nan());
        assert!(!b.is_valid());
    }

    #[test]
    fn scale_and_pad_identities() {
        assert_eq!(scale(&sample(), 1.0), sample());
        assert_eq!(pad(&sample(), 0.0), sample());
    }

    #[test]
    fn scale_keeps_centre() {
        let s = scale(&sample(), 1.1);
        assert_eq!(s.center(), sample().center());
        assert!((s.width() - 44.0).abs() < 1e-9);
        assert!((s.height() - 22.0).abs() < 1e-9);
    }

    #[test]
    fn pad_grows_each_side() {
        let p = pad(&sample(), 2.5);
        assert_eq!(p, BoundingBox::new(-12.5, 2.5, 32.5, 27.5));
    }

    #[test]
    fn fit_aspect_extends_from_top_left() {
        // 40x20 box into a square: height grows to 40.
        let f = fit_aspect(&sample(), 1.0);
        assert_eq!(f.min_x, -10.0);
        assert_eq!(f.min_y, 5.0);
        assert_eq!(f.width(), 40.0);
        assert_eq!(f.height(), 40.0);

        // Same box into 4:1: width grows to 80.
        let f = fit_aspect(&sample(), 4.0);
        assert_eq!(f.width(), 80.0);
        assert_eq!(f.height(), 20.0);
    }
}
