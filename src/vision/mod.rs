//! Vision/OCR Layer
//!
//! Adapters around external OCR providers. Every backend returns detected
//! text blocks in the upright image's pixel space, in the provider's own
//! enumeration order. Supports:
//! - Windows OCR API (Windows only)
//! - JSON sidecar files written by an external OCR tool

pub mod sidecar;
#[cfg(windows)]
pub mod windows_ocr;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::Rotation;
use crate::config::OcrSettings;
use crate::lens::DetectedTextBlock;

pub use sidecar::SidecarOcr;
#[cfg(windows)]
pub use windows_ocr::WindowsOcr;

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Windows built-in OCR
    Windows,
    /// `<image>.ocr.json` next to the captured image
    Sidecar,
}

impl Default for OcrBackend {
    fn default() -> Self {
        if cfg!(windows) {
            OcrBackend::Windows
        } else {
            OcrBackend::Sidecar
        }
    }
}

/// OCR result granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrGranularity {
    /// Individual words with their bounding boxes
    Word,
    /// Full lines with their bounding boxes
    #[default]
    Line,
}

/// Errors reported by an OCR provider
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend {0:?} is not available on this platform")]
    Unsupported(OcrBackend),

    #[error("no OCR results found for {0:?}")]
    MissingResults(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Backend(String),

    #[error("OCR request ended without a result")]
    Abandoned,
}

/// One recognition request, issued once per capture
#[derive(Debug, Clone)]
pub struct OcrRequest {
    /// Upright bitmap shown to the user
    pub image: Arc<RgbaImage>,
    /// Rotation that was applied to the raw frame to make `image` upright
    pub rotation: Rotation,
    /// File the frame was loaded from, if any
    pub source_path: Option<PathBuf>,
}

impl OcrRequest {
    /// Size of the raw frame before rotation correction
    pub fn raw_size(&self) -> (u32, u32) {
        self.rotation.rotated_size(self.image.dimensions())
    }
}

/// An external OCR engine
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Detect text blocks in upright image pixel coordinates
    async fn recognize(&self, request: OcrRequest) -> Result<Vec<DetectedTextBlock>, OcrError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Create the configured OCR provider
pub fn create_provider(backend: OcrBackend, settings: &OcrSettings) -> Result<Arc<dyn OcrProvider>, OcrError> {
    info!("Initializing {:?} OCR backend", backend);
    match backend {
        OcrBackend::Sidecar => Ok(Arc::new(SidecarOcr::new())),
        #[cfg(windows)]
        OcrBackend::Windows => Ok(Arc::new(WindowsOcr::new(&settings.language, settings.granularity)?)),
        #[cfg(not(windows))]
        OcrBackend::Windows => {
            let _ = settings;
            Err(OcrError::Unsupported(backend))
        }
    }
}

/// Drop blocks that carry no text; keep provider order for the rest
pub fn retain_text_blocks(blocks: Vec<DetectedTextBlock>) -> Vec<DetectedTextBlock> {
    let before = blocks.len();
    let kept: Vec<_> = blocks
        .into_iter()
        .filter(|block| !block.text.trim().is_empty())
        .collect();
    if kept.len() != before {
        debug!("Dropped {} blocks without text", before - kept.len());
    }
    kept
}
