//! JSON sidecar OCR backend
//!
//! Reads text blocks produced by an external OCR tool from a file next to
//! the captured image: `photo.png` pairs with `photo.ocr.json`.
//!
//! ```json
//! {
//!   "space": "raw",
//!   "blocks": [
//!     { "text": "学校", "left": 100, "top": 100, "right": 300, "bottom": 200 }
//!   ]
//! }
//! ```
//!
//! `space` says whether boxes were measured on the raw sensor frame (`raw`)
//! or on the upright image (`upright`, the default). Raw boxes are rotated
//! with the same convention as the bitmap.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::geometry::Rect;
use crate::lens::DetectedTextBlock;
use crate::vision::{OcrError, OcrProvider, OcrRequest};

/// Coordinate space of the boxes in a sidecar file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxSpace {
    /// Measured on the frame before rotation correction
    Raw,
    /// Measured on the upright image
    #[default]
    Upright,
}

/// On-disk sidecar document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarDocument {
    #[serde(default)]
    pub space: BoxSpace,
    pub blocks: Vec<SidecarBlock>,
}

/// One text block in a sidecar document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarBlock {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl SidecarDocument {
    /// Convert to detected blocks in upright image space
    pub fn into_blocks(self, request: &OcrRequest) -> Vec<DetectedTextBlock> {
        let raw_size = request.raw_size();
        self.blocks
            .into_iter()
            .map(|block| {
                let rect = Rect::new(block.left, block.top, block.right, block.bottom);
                let rect = match self.space {
                    BoxSpace::Raw => request.rotation.map_rect(rect, raw_size),
                    BoxSpace::Upright => rect,
                };
                DetectedTextBlock::new(block.text, rect)
            })
            .collect()
    }
}

/// Sidecar path for a captured image
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("ocr.json")
}

/// OCR provider backed by sidecar JSON files
#[derive(Debug, Default)]
pub struct SidecarOcr;

impl SidecarOcr {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OcrProvider for SidecarOcr {
    async fn recognize(&self, request: OcrRequest) -> Result<Vec<DetectedTextBlock>, OcrError> {
        let Some(image_path) = request.source_path.as_deref() else {
            return Err(OcrError::Backend("sidecar OCR needs an image loaded from a file".to_string()));
        };
        let path = sidecar_path(image_path);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::MissingResults(path));
            }
            Err(source) => return Err(OcrError::Io { path, source }),
        };

        let document: SidecarDocument =
            serde_json::from_str(&content).map_err(|source| OcrError::Parse { path: path.clone(), source })?;

        debug!("Sidecar {:?}: {} blocks ({:?} space)", path, document.blocks.len(), document.space);
        Ok(document.into_blocks(&request))
    }

    fn name(&self) -> &str {
        "sidecar"
    }
}
