/// Axis-aligned rectangle with a top-left origin, in PDF points.
///
/// `y0` is the top edge and `y1` the bottom edge, as MuPDF reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Finite coordinates and a positive area.
    pub fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 > self.x0
            && self.y1 > self.y0
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the shared vertical extent (0 when disjoint).
    pub fn vertical_overlap(&self, other: &Self) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    pub fn overlaps_horizontally(&self, other: &Self) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1
    }

    /// Coordinates snapped to the nearest multiple of `step`.
    pub fn rounded(&self, step: f32) -> [f32; 4] {
        let snap = |v: f32| (v / step).round() * step;
        [snap(self.x0), snap(self.y0), snap(self.x1), snap(self.y1)]
    }
}

/// A positioned run of text as reported by the document backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub rect: Rect,
    pub text: String,
}

impl TextFragment {
    pub fn new(rect: Rect, text: impl Into<String>) -> Self {
        Self {
            rect,
            text: text.into(),
        }
    }
}

/// Everything the extractor needs from one page.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    /// Zero-based page index
    pub page: usize,
    pub width: f32,
    pub height: f32,
    /// Fragments in the backend's reading order
    pub fragments: Vec<TextFragment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_dimensions() {
        let r = Rect::new(10.0, 20.0, 50.0, 30.0);
        assert!((r.width() - 40.0).abs() < f32::EPSILON);
        assert!((r.height() - 10.0).abs() < f32::EPSILON);
        assert!((r.area() - 400.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rect_validity() {
        assert!(Rect::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Rect::new(5.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, f32::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn test_rect_overlap_helpers() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 20.0, 20.0);
        assert!((a.vertical_overlap(&b) - 5.0).abs() < f32::EPSILON);
        assert!(a.overlaps_horizontally(&b));
        assert!(!a.overlaps_horizontally(&Rect::new(10.0, 0.0, 12.0, 1.0)));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_rect_rounding() {
        let r = Rect::new(10.26, 3.74, 0.1, 7.0);
        assert_eq!(r.rounded(0.5), [10.5, 3.5, 0.0, 7.0]);
    }
}
