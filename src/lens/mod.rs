//! Lens Overlay Engine
//!
//! Maps OCR text regions from image space onto the frozen preview, paints
//! them as translucent highlights and resolves taps back to recognized text.

pub mod render;
pub mod store;

pub use hit_test::hit_test;
pub use render::{build_draw_list, paint, DrawCommand, HighlightStyle};
pub use store::{AnnotationStore, CapturedImage, DetectedTextBlock, DisplayedAnnotation, Generation};
