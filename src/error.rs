//! Error taxonomy for the lens core
//!
//! Provider failures are converted into these variants at the boundary and
//! never cross into the UI as panics. A tap that misses every box is not an
//! error; see [`crate::session::TapOutcome`].

use thiserror::Error;

use crate::lens::Generation;
use crate::translate::TranslationError;
use crate::vision::OcrError;

#[derive(Debug, Error)]
pub enum LensError {
    /// Detection results arrived while no image is held
    #[error("no captured image is held")]
    NoImage,

    /// Detection results belong to an image that has since been replaced
    #[error("detection results for generation {got} arrived after generation {expected} was captured")]
    StaleGeneration { expected: Generation, got: Generation },

    #[error("OCR provider failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("translation provider failed: {0}")]
    Translation(#[from] TranslationError),
}

impl LensError {
    /// Results that are silently discarded rather than reported to the user
    pub fn is_discarded_result(&self) -> bool {
        matches!(self, LensError::NoImage | LensError::StaleGeneration { .. })
    }
}
