//! Frame data structures for captured images

use image::RgbaImage;

use crate::capture::Rotation;

/// A raw frame as delivered by the capture source, before rotation correction
#[derive(Debug)]
pub struct CapturedFrame {
    /// Raw RGBA pixels in sensor orientation
    pub image: RgbaImage,
    /// Clockwise rotation needed to make the frame upright
    pub rotation: Rotation,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage, rotation: Rotation) -> Self {
        Self { image, rotation }
    }

    /// Get raw frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Rotate the pixels upright, consuming the frame
    pub fn into_upright(self) -> RgbaImage {
        self.rotation.apply(self.image)
    }
}
