//! Annotation store
//!
//! Holds the captured image and the display-space annotations derived from
//! it. Annotations are derived state keyed to the image: every image change
//! clears them, and detection results tagged for another image are refused.

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::LensError;
use crate::geometry::{Rect, ScaleFactors, ViewSize};

/// Monotonically increasing tag identifying which capture data belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A text region reported by the OCR provider, in image pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTextBlock {
    pub text: String,
    pub bounding_box: Rect,
}

impl DetectedTextBlock {
    pub fn new(text: impl Into<String>, bounding_box: Rect) -> Self {
        Self {
            text: text.into(),
            bounding_box,
        }
    }
}

/// A text region mapped into display space, ready to draw and hit-test
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedAnnotation {
    pub text: String,
    pub bounding_box: Rect,
}

/// The upright bitmap of the most recent capture
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pixels: Arc<RgbaImage>,
    generation: Generation,
}

impl CapturedImage {
    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Owner of the captured image and its annotations.
///
/// Only the session's owning thread touches it.
#[derive(Debug)]
pub struct AnnotationStore {
    image: Option<CapturedImage>,
    generation: Generation,
    view: ViewSize,
    /// Blocks behind the current annotations, kept to re-map on relayout
    blocks: Vec<DetectedTextBlock>,
    annotations: Arc<[DisplayedAnnotation]>,
    dirty: bool,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self {
            image: None,
            generation: Generation::default(),
            view: ViewSize::default(),
            blocks: Vec::new(),
            annotations: Arc::from(Vec::new()),
            dirty: false,
        }
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held image (or clear it) and drop every annotation.
    ///
    /// Returns the generation assigned to the new image; results for any
    /// earlier generation are refused from now on.
    pub fn set_image(&mut self, pixels: Option<RgbaImage>) -> Generation {
        self.generation = self.generation.next();
        self.image = pixels.map(|pixels| CapturedImage {
            pixels: Arc::new(pixels),
            generation: self.generation,
        });
        self.blocks.clear();
        self.annotations = Arc::from(Vec::new());
        self.dirty = true;

        debug!(
            "Image {} for generation {}",
            if self.image.is_some() { "set" } else { "cleared" },
            self.generation
        );
        self.generation
    }

    /// Map detection results for `generation` into display space and replace
    /// the annotation set in one step. Returns the number of annotations.
    pub fn set_detected_blocks(
        &mut self,
        generation: Generation,
        blocks: Vec<DetectedTextBlock>,
    ) -> Result<usize, LensError> {
        let Some(image) = &self.image else {
            return Err(LensError::NoImage);
        };
        if image.generation != generation {
            return Err(LensError::StaleGeneration {
                expected: image.generation,
                got: generation,
            });
        }

        self.blocks = blocks;
        self.remap();
        Ok(self.annotations.len())
    }

    /// Record the display size from the latest layout pass.
    ///
    /// A size change re-maps held blocks so boxes stay aligned with the
    /// stretched image. Returns whether the size changed.
    pub fn set_view_size(&mut self, view: ViewSize) -> bool {
        if self.view == view {
            return false;
        }
        self.view = view;
        if self.image.is_some() && !self.blocks.is_empty() {
            self.remap();
        }
        self.dirty = true;
        true
    }

    /// Snapshot of the current annotations in detection order
    pub fn current_annotations(&self) -> Arc<[DisplayedAnnotation]> {
        Arc::clone(&self.annotations)
    }

    pub fn image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn view_size(&self) -> ViewSize {
        self.view
    }

    /// Report and reset whether a redraw is due
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn remap(&mut self) {
        let Some(image) = &self.image else {
            return;
        };
        // One set of ratios per batch so every box scales consistently
        let factors = ScaleFactors::between(image.dimensions(), self.view);
        let mapped: Vec<DisplayedAnnotation> = self
            .blocks
            .iter()
            .map(|block| DisplayedAnnotation {
                text: block.text.clone(),
                bounding_box: factors.map(block.bounding_box),
            })
            .collect();

        debug!(
            "Mapped {} blocks with ratios ({:.4}, {:.4})",
            mapped.len(),
            factors.width_ratio,
            factors.height_ratio
        );
        self.annotations = Arc::from(mapped);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::lens::hit_test;

    fn block(text: &str, left: f32, top: f32, right: f32, bottom: f32) -> DetectedTextBlock {
        DetectedTextBlock::new(text, Rect::new(left, top, right, bottom))
    }

    fn store_with_view(width: f32, height: f32) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        store.set_view_size(ViewSize::new(width, height));
        store
    }

    #[test]
    fn test_set_image_always_clears_annotations() {
        let mut store = store_with_view(100.0, 100.0);

        let generation = store.set_image(Some(RgbaImage::new(100, 100)));
        store
            .set_detected_blocks(generation, vec![block("a", 0.0, 0.0, 10.0, 10.0)])
            .unwrap();
        assert_eq!(store.current_annotations().len(), 1);

        // New image
        let generation = store.set_image(Some(RgbaImage::new(50, 50)));
        assert!(store.current_annotations().is_empty());

        store
            .set_detected_blocks(generation, vec![block("b", 0.0, 0.0, 10.0, 10.0)])
            .unwrap();
        assert_eq!(store.current_annotations().len(), 1);

        // Reset to absent
        store.set_image(None);
        assert!(store.current_annotations().is_empty());
        assert!(store.image().is_none());

        // Absent again
        store.set_image(None);
        assert!(store.current_annotations().is_empty());
    }

    #[test]
    fn test_blocks_without_image_are_refused() {
        let mut store = store_with_view(100.0, 100.0);
        let generation = store.set_image(None);

        let result = store.set_detected_blocks(generation, vec![block("a", 0.0, 0.0, 1.0, 1.0)]);
        assert!(matches!(result, Err(LensError::NoImage)));
        assert!(store.current_annotations().is_empty());
    }

    #[test]
    fn test_stale_generation_is_refused() {
        let mut store = store_with_view(100.0, 100.0);

        let first = store.set_image(Some(RgbaImage::new(100, 100)));
        let second = store.set_image(Some(RgbaImage::new(100, 100)));
        assert!(second > first);

        let result = store.set_detected_blocks(first, vec![block("late", 0.0, 0.0, 50.0, 50.0)]);
        match result {
            Err(LensError::StaleGeneration { expected, got }) => {
                assert_eq!(expected, second);
                assert_eq!(got, first);
            }
            other => panic!("expected stale generation, got {:?}", other),
        }
        assert!(store.current_annotations().is_empty());
    }

    #[test]
    fn test_preserves_detection_order() {
        let mut store = store_with_view(200.0, 200.0);
        let generation = store.set_image(Some(RgbaImage::new(100, 100)));

        let blocks = vec![
            block("third", 50.0, 50.0, 60.0, 60.0),
            block("first", 0.0, 0.0, 10.0, 10.0),
            block("second", 20.0, 20.0, 30.0, 30.0),
        ];
        store.set_detected_blocks(generation, blocks).unwrap();

        let texts: Vec<_> = store.current_annotations().iter().map(|a| a.text.clone()).collect();
        assert_eq!(texts, vec!["third", "first", "second"]);
    }

    #[test]
    fn test_current_annotations_idempotent() {
        let mut store = store_with_view(300.0, 300.0);
        let generation = store.set_image(Some(RgbaImage::new(100, 100)));
        store
            .set_detected_blocks(generation, vec![block("x", 1.0, 2.0, 3.0, 4.0)])
            .unwrap();

        let a = store.current_annotations();
        let b = store.current_annotations();
        assert_eq!(a, b);
    }

    #[test]
    fn test_replacement_does_not_disturb_existing_snapshot() {
        let mut store = store_with_view(100.0, 100.0);
        let generation = store.set_image(Some(RgbaImage::new(100, 100)));
        store
            .set_detected_blocks(generation, vec![block("old", 0.0, 0.0, 10.0, 10.0)])
            .unwrap();

        let snapshot = store.current_annotations();
        store
            .set_detected_blocks(
                generation,
                vec![block("new", 0.0, 0.0, 10.0, 10.0), block("new2", 20.0, 20.0, 30.0, 30.0)],
            )
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "old");
        assert_eq!(store.current_annotations().len(), 2);
    }

    #[test]
    fn test_unlaid_out_view_collapses_boxes() {
        let mut store = AnnotationStore::new();
        let generation = store.set_image(Some(RgbaImage::new(100, 100)));
        let count = store
            .set_detected_blocks(generation, vec![block("a", 10.0, 10.0, 50.0, 50.0)])
            .unwrap();

        assert_eq!(count, 1);
        let annotations = store.current_annotations();
        assert_eq!(annotations[0].bounding_box, Rect::new(0.0, 0.0, 0.0, 0.0));
        assert!(hit_test(Point::new(0.0, 0.0), &annotations).is_none());
    }

    #[test]
    fn test_relayout_remaps_boxes() {
        let mut store = AnnotationStore::new();
        let generation = store.set_image(Some(RgbaImage::new(100, 100)));
        store
            .set_detected_blocks(generation, vec![block("a", 10.0, 10.0, 50.0, 50.0)])
            .unwrap();

        assert!(store.set_view_size(ViewSize::new(200.0, 100.0)));
        assert!(!store.set_view_size(ViewSize::new(200.0, 100.0)));

        let annotations = store.current_annotations();
        assert_eq!(annotations[0].bounding_box, Rect::new(20.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut store = store_with_view(500.0, 800.0);
        let generation = store.set_image(Some(RgbaImage::new(1000, 2000)));
        store
            .set_detected_blocks(generation, vec![block("学校", 100.0, 100.0, 300.0, 200.0)])
            .unwrap();

        let annotations = store.current_annotations();
        assert_eq!(annotations.len(), 1);
        let mapped = annotations[0].bounding_box;
        assert!((mapped.left - 50.0).abs() < 1e-4);
        assert!((mapped.top - 40.0).abs() < 1e-4);
        assert!((mapped.right - 150.0).abs() < 1e-4);
        assert!((mapped.bottom - 80.0).abs() < 1e-4);

        let hit = hit_test(Point::new(100.0, 60.0), &annotations).map(|a| a.text.as_str());
        assert_eq!(hit, Some("学校"));
        assert!(hit_test(Point::new(200.0, 60.0), &annotations).is_none());
    }

    #[test]
    fn test_dirty_flag() {
        let mut store = AnnotationStore::new();
        assert!(!store.take_dirty());

        store.set_image(None);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }
}
