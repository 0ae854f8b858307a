//! Capture Layer
//!
//! Loads still frames from disk and corrects sensor rotation so that the
//! bitmap shown on screen and the boxes handed to the annotation store share
//! one coordinate convention.

pub mod frame;

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::geometry::Rect;

pub use frame::CapturedFrame;

/// Clockwise rotation that turns a raw frame upright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse a rotation in degrees; only right angles are accepted
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Rotate a bitmap clockwise by this amount
    pub fn apply(&self, image: RgbaImage) -> RgbaImage {
        match self {
            Rotation::None => image,
            Rotation::Cw90 => image::imageops::rotate90(&image),
            Rotation::Cw180 => image::imageops::rotate180(&image),
            Rotation::Cw270 => image::imageops::rotate270(&image),
        }
    }

    /// Dimensions of a `(width, height)` frame after rotation
    pub fn rotated_size(&self, size: (u32, u32)) -> (u32, u32) {
        match self {
            Rotation::None | Rotation::Cw180 => size,
            Rotation::Cw90 | Rotation::Cw270 => (size.1, size.0),
        }
    }

    /// Re-express a rectangle given in the raw frame (of `raw_size`) in the
    /// coordinate space of the rotated frame.
    pub fn map_rect(&self, rect: Rect, raw_size: (u32, u32)) -> Rect {
        let w = raw_size.0 as f32;
        let h = raw_size.1 as f32;
        match self {
            Rotation::None => rect,
            Rotation::Cw90 => Rect::new(h - rect.bottom, rect.left, h - rect.top, rect.right),
            Rotation::Cw180 => Rect::new(w - rect.right, h - rect.bottom, w - rect.left, h - rect.top),
            Rotation::Cw270 => Rect::new(rect.top, w - rect.right, rect.bottom, w - rect.left),
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270 degrees, got {}", degrees))
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Load a still image from disk as a captured frame
pub fn load_frame(path: &Path, rotation: Rotation) -> Result<CapturedFrame> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {:?}", path))?
        .to_rgba8();

    debug!(
        "Loaded frame {:?}: {}x{}, rotation {}",
        path,
        image.width(),
        image.height(),
        rotation.degrees()
    );

    Ok(CapturedFrame::new(image, rotation))
}
