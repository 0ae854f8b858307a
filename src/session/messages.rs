//! Messages delivered from provider tasks back to the session thread

use crossbeam_channel::Sender;

use crate::lens::{DetectedTextBlock, Generation};
use crate::translate::{RequestId, TranslationError};
use crate::vision::OcrError;

/// Results from asynchronous providers, tagged with what they belong to
#[derive(Debug)]
pub enum LensEvent {
    /// OCR finished for the capture with this generation
    OcrFinished {
        generation: Generation,
        result: Result<Vec<DetectedTextBlock>, OcrError>,
    },
    /// A translation request finished
    TranslationFinished {
        request: RequestId,
        result: Result<String, TranslationError>,
    },
}

/// Reply slot for one OCR request.
///
/// Sends exactly one `OcrFinished`: the real result, or `Abandoned` if the
/// task is dropped first.
pub struct OcrTicket {
    generation: Generation,
    events: Option<Sender<LensEvent>>,
}

impl OcrTicket {
    pub fn new(generation: Generation, events: Sender<LensEvent>) -> Self {
        Self {
            generation,
            events: Some(events),
        }
    }

    pub fn complete(mut self, result: Result<Vec<DetectedTextBlock>, OcrError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<Vec<DetectedTextBlock>, OcrError>) {
        if let Some(events) = self.events.take() {
            // The session may already be gone at shutdown
            let _ = events.send(LensEvent::OcrFinished {
                generation: self.generation,
                result,
            });
        }
    }
}

impl Drop for OcrTicket {
    fn drop(&mut self) {
        self.send(Err(OcrError::Abandoned));
    }
}

/// Reply slot for one translation request.
///
/// Every exit path of the request task, including cancellation or a panic,
/// produces exactly one `TranslationFinished`, which returns the gate to idle.
pub struct TranslationTicket {
    request: RequestId,
    events: Option<Sender<LensEvent>>,
}

impl TranslationTicket {
    pub fn new(request: RequestId, events: Sender<LensEvent>) -> Self {
        Self {
            request,
            events: Some(events),
        }
    }

    pub fn complete(mut self, result: Result<String, TranslationError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<String, TranslationError>) {
        if let Some(events) = self.events.take() {
            let _ = events.send(LensEvent::TranslationFinished {
                request: self.request,
                result,
            });
        }
    }
}

impl Drop for TranslationTicket {
    fn drop(&mut self) {
        self.send(Err(TranslationError::Abandoned));
    }
}
