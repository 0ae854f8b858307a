//! Rectangle math shared by the annotation store, hit tester and renderer
//!
//! All coordinates are `f32` pixels. Image space is the captured bitmap's
//! pixel grid; display space is the on-screen view's pixel grid.

use serde::{Deserialize, Serialize};

/// A point in some pixel coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its four edges
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Build from an (x, y, width, height) tuple as reported by most OCR engines
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// True when the rectangle has `left < right` and `top < bottom`
    pub fn is_well_ordered(&self) -> bool {
        self.left < self.right && self.top < self.bottom
    }

    /// Inclusive containment on all four edges.
    ///
    /// A zero-area rectangle is never hit, even by a point lying exactly on it.
    pub fn contains(&self, point: Point) -> bool {
        if !self.is_well_ordered() {
            return false;
        }
        self.left <= point.x && point.x <= self.right && self.top <= point.y && point.y <= self.bottom
    }
}

/// Display size of the view showing the captured image
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewSize {
    pub width: f32,
    pub height: f32,
}

impl ViewSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// The view as a rectangle anchored at the display origin
    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Independent horizontal and vertical image-to-view scale factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub width_ratio: f32,
    pub height_ratio: f32,
}

impl ScaleFactors {
    /// Ratios that stretch an image of `image_size` pixels to fill `view`.
    ///
    /// An unlaid-out view yields zero ratios. A zero image dimension also
    /// yields a zero ratio for that axis instead of infinity.
    pub fn between(image_size: (u32, u32), view: ViewSize) -> Self {
        let ratio = |view_len: f32, image_len: u32| {
            if image_len == 0 {
                0.0
            } else {
                view_len / image_len as f32
            }
        };
        Self {
            width_ratio: ratio(view.width, image_size.0),
            height_ratio: ratio(view.height, image_size.1),
        }
    }

    pub fn map(&self, rect: Rect) -> Rect {
        map_rect(rect, self.width_ratio, self.height_ratio)
    }
}

/// Scale every edge of `source` by the ratio for its axis.
///
/// No special-casing of degenerate rectangles or non-positive ratios.
pub fn map_rect(source: Rect, width_ratio: f32, height_ratio: f32) -> Rect {
    Rect {
        left: source.left * width_ratio,
        top: source.top * height_ratio,
        right: source.right * width_ratio,
        bottom: source.bottom * height_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rect_identity() {
        let rect = Rect::new(12.5, 3.0, 40.25, 99.0);
        assert_eq!(map_rect(rect, 1.0, 1.0), rect);
    }

    #[test]
    fn test_map_rect_independent_axes() {
        let mapped = map_rect(Rect::new(100.0, 100.0, 300.0, 200.0), 0.5, 0.4);
        assert_eq!(mapped, Rect::new(50.0, 40.0, 150.0, 80.0));
    }

    #[test]
    fn test_map_rect_preserves_ordering_for_positive_ratios() {
        let rects = [
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(10.0, 20.0, 11.0, 1000.0),
            Rect::new(3.5, 7.25, 1920.0, 1080.0),
        ];
        let ratios = [(0.01, 0.02), (0.5, 3.0), (1.0, 1.0), (7.3, 0.123)];

        for rect in rects {
            for (wr, hr) in ratios {
                let mapped = map_rect(rect, wr, hr);
                assert!(mapped.is_well_ordered(), "{rect:?} x ({wr}, {hr}) -> {mapped:?}");
            }
        }
    }

    #[test]
    fn test_map_rect_degenerate_inputs() {
        // Zero ratio collapses the box; it must still map without panicking
        let collapsed = map_rect(Rect::new(10.0, 10.0, 20.0, 20.0), 0.0, 0.0);
        assert_eq!(collapsed, Rect::new(0.0, 0.0, 0.0, 0.0));
        assert!(!collapsed.contains(Point::new(0.0, 0.0)));

        // Negative ratios flip through the same formula
        let flipped = map_rect(Rect::new(10.0, 10.0, 20.0, 20.0), -1.0, 1.0);
        assert_eq!(flipped, Rect::new(-10.0, 10.0, -20.0, 20.0));
    }

    #[test]
    fn test_contains_inclusive_edges() {
        let rect = Rect::new(50.0, 40.0, 150.0, 80.0);
        assert!(rect.contains(Point::new(50.0, 40.0)));
        assert!(rect.contains(Point::new(150.0, 80.0)));
        assert!(rect.contains(Point::new(100.0, 60.0)));
        assert!(!rect.contains(Point::new(150.01, 60.0)));
        assert!(!rect.contains(Point::new(100.0, 39.99)));
    }

    #[test]
    fn test_scale_factors_between() {
        let factors = ScaleFactors::between((1000, 2000), ViewSize::new(500.0, 800.0));
        assert!((factors.width_ratio - 0.5).abs() < f32::EPSILON);
        assert!((factors.height_ratio - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_scale_factors_unlaid_out_view() {
        let factors = ScaleFactors::between((1000, 2000), ViewSize::default());
        assert_eq!(factors.width_ratio, 0.0);
        assert_eq!(factors.height_ratio, 0.0);
    }

    #[test]
    fn test_scale_factors_empty_image() {
        let factors = ScaleFactors::between((0, 10), ViewSize::new(100.0, 100.0));
        assert_eq!(factors.width_ratio, 0.0);
        assert!((factors.height_ratio - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_xywh() {
        let rect = Rect::from_xywh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 40.0, 60.0));
    }
}
