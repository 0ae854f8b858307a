//! Lens Session
//!
//! Single-threaded owner of the lens state. Provider work runs on the tokio
//! runtime; its results come back as [`LensEvent`]s and are applied on the
//! thread that owns the session, so the store and the translation gate are
//! never shared.

pub mod messages;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::capture::CapturedFrame;
use crate::error::LensError;
use crate::geometry::{Point, ViewSize};
use crate::lens::{self, AnnotationStore, DrawCommand, Generation, HighlightStyle};
use crate::translate::{RequestId, TranslationGate, TranslationMode, TranslationProvider};
use crate::vision::{self, OcrProvider, OcrRequest};

pub use messages::{LensEvent, OcrTicket, TranslationTicket};

/// What a tap on the preview did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// No annotation under the point
    Miss,
    /// A translation is already running; the tap was ignored
    Busy,
    /// A translation of `text` was started
    Started { request: RequestId, text: String },
}

/// Progress of text detection for the current image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrStatus {
    Idle,
    Recognizing(Generation),
    Done { generation: Generation, blocks: usize },
    Failed { generation: Generation, error: String },
}

/// What the output area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationStatus {
    Idle,
    Translating { request: RequestId, source: String },
    Translated { source: String, result: String },
    Failed { source: String, error: String },
}

impl TranslationStatus {
    /// Text for the output area
    pub fn output_text(&self) -> String {
        match self {
            TranslationStatus::Idle => String::new(),
            TranslationStatus::Translating { source, .. } => format!("Translating:\n{}", source),
            TranslationStatus::Translated { result, .. } => format!("Translation result:\n{}", result),
            TranslationStatus::Failed { source, error } => {
                format!("Translation failed:\n{}\n\n{}", source, error)
            }
        }
    }
}

pub struct LensSession {
    store: AnnotationStore,
    gate: TranslationGate,
    ocr: Arc<dyn OcrProvider>,
    translator: Arc<dyn TranslationProvider>,
    mode: TranslationMode,
    runtime: Handle,
    events_tx: Sender<LensEvent>,
    events_rx: Receiver<LensEvent>,
    ocr_status: OcrStatus,
    translation: TranslationStatus,
}

impl LensSession {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        translator: Arc<dyn TranslationProvider>,
        mode: TranslationMode,
        runtime: Handle,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        info!(
            "Lens session using {} OCR and {} translation ({})",
            ocr.name(),
            translator.name(),
            mode.label()
        );
        Self {
            store: AnnotationStore::new(),
            gate: TranslationGate::new(),
            ocr,
            translator,
            mode,
            runtime,
            events_tx,
            events_rx,
            ocr_status: OcrStatus::Idle,
            translation: TranslationStatus::Idle,
        }
    }

    /// Show a new frame and start text detection on it.
    ///
    /// The frame is rotated upright first; boxes from the provider are in
    /// upright pixel space. Any detection still running for an older frame
    /// is discarded when it arrives.
    pub fn capture(&mut self, frame: CapturedFrame, source_path: Option<PathBuf>) -> Generation {
        let rotation = frame.rotation;
        let (raw_width, raw_height) = frame.dimensions();
        let generation = self.store.set_image(Some(frame.into_upright()));
        let Some(image) = self.store.image() else {
            return generation;
        };

        let request = OcrRequest {
            image: Arc::clone(image.pixels()),
            rotation,
            source_path,
        };
        info!(
            "Captured {}x{} frame (rotation {}°), generation {}",
            raw_width,
            raw_height,
            rotation.degrees(),
            generation
        );

        let provider = Arc::clone(&self.ocr);
        let ticket = OcrTicket::new(generation, self.events_tx.clone());
        self.runtime.spawn(async move {
            let result = provider.recognize(request).await.map(vision::retain_text_blocks);
            ticket.complete(result);
        });

        self.ocr_status = OcrStatus::Recognizing(generation);
        generation
    }

    /// Drop the image and every annotation, and clear the output area.
    ///
    /// A translation already running still releases the gate when it ends,
    /// but its result is not shown.
    pub fn reset(&mut self) {
        let generation = self.store.set_image(None);
        self.ocr_status = OcrStatus::Idle;
        self.translation = TranslationStatus::Idle;
        debug!("Session reset at generation {}", generation);
    }

    /// Record the preview size from the latest layout pass
    pub fn set_view_size(&mut self, view: ViewSize) -> bool {
        self.store.set_view_size(view)
    }

    /// Handle a tap in display coordinates
    pub fn tap(&mut self, point: Point) -> TapOutcome {
        let annotations = self.store.current_annotations();
        let Some(hit) = lens::hit_test(point, &annotations) else {
            return TapOutcome::Miss;
        };
        let Some(request) = self.gate.try_begin() else {
            debug!("Tap on {:?} ignored: translation in progress", hit.text);
            return TapOutcome::Busy;
        };

        let text = hit.text.clone();
        info!("Translating {:?} as {}", text, request);
        self.translation = TranslationStatus::Translating {
            request,
            source: text.clone(),
        };

        let translator = Arc::clone(&self.translator);
        let mode = self.mode;
        let source = text.clone();
        let ticket = TranslationTicket::new(request, self.events_tx.clone());
        self.runtime.spawn(async move {
            let result = translator.translate(&source, mode).await;
            ticket.complete(result);
        });

        TapOutcome::Started { request, text }
    }

    /// Apply every event that has arrived. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Block up to `timeout` for one event, then apply it and anything else pending
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                1 + self.pump()
            }
            // The session holds a sender itself, so only a timeout ends up here
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, event: LensEvent) {
        match event {
            LensEvent::OcrFinished { generation, result } => {
                if let Err(e) = self.apply_ocr(generation, result) {
                    if e.is_discarded_result() {
                        debug!("Discarded OCR result: {}", e);
                    } else {
                        warn!("{}", e);
                        if self.store.generation() == generation {
                            self.ocr_status = OcrStatus::Failed {
                                generation,
                                error: e.to_string(),
                            };
                        }
                    }
                }
            }
            LensEvent::TranslationFinished { request, result } => {
                if !self.gate.finish(request) {
                    debug!("Ignoring finish for {}; gate is {:?}", request, self.gate.state());
                }
                let source = match &self.translation {
                    TranslationStatus::Translating { request: shown, source } if *shown == request => {
                        source.clone()
                    }
                    _ => {
                        debug!("Translation {} finished after reset; not shown", request);
                        return;
                    }
                };
                self.translation = match result.map_err(LensError::from) {
                    Ok(result) => {
                        info!("Translation {} done", request);
                        TranslationStatus::Translated { source, result }
                    }
                    Err(e) => {
                        warn!("{}", e);
                        TranslationStatus::Failed {
                            source,
                            error: e.to_string(),
                        }
                    }
                };
            }
        }
    }

    fn apply_ocr(
        &mut self,
        generation: Generation,
        result: Result<Vec<lens::DetectedTextBlock>, vision::OcrError>,
    ) -> Result<(), LensError> {
        // Refuse before looking at the result, failed or not
        match self.store.image() {
            None => return Err(LensError::NoImage),
            Some(image) if image.generation() != generation => {
                return Err(LensError::StaleGeneration {
                    expected: image.generation(),
                    got: generation,
                });
            }
            Some(_) => {}
        }

        let blocks = result?;
        let count = self.store.set_detected_blocks(generation, blocks)?;
        info!("Detected {} text blocks for generation {}", count, generation);
        self.ocr_status = OcrStatus::Done {
            generation,
            blocks: count,
        };
        Ok(())
    }

    /// Draw sequence for the current state
    pub fn draw_list(&self, style: &HighlightStyle) -> Vec<DrawCommand> {
        let annotations = self.store.current_annotations();
        lens::build_draw_list(self.store.image(), &annotations, self.store.view_size(), style)
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Report and reset whether the preview needs repainting
    pub fn take_dirty(&mut self) -> bool {
        self.store.take_dirty()
    }

    pub fn ocr_status(&self) -> &OcrStatus {
        &self.ocr_status
    }

    pub fn translation(&self) -> &TranslationStatus {
        &self.translation
    }

    pub fn is_translating(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn mode(&self) -> TranslationMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Rotation;
    use crate::geometry::Rect;
    use crate::lens::DetectedTextBlock;
    use crate::translate::TranslationError;
    use crate::vision::OcrError;
    use async_trait::async_trait;
    use image::RgbaImage;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use tokio::runtime::Runtime;
    use tokio::sync::oneshot;

    const WAIT: Duration = Duration::from_secs(5);

    type OcrReply = Result<Vec<DetectedTextBlock>, OcrError>;
    type TranslationReply = Result<String, TranslationError>;

    /// Answers each request with whatever the test sends for that image width
    struct ScriptedOcr {
        replies: Mutex<HashMap<u32, oneshot::Receiver<OcrReply>>>,
    }

    impl ScriptedOcr {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(HashMap::new()),
            })
        }

        fn expect(&self, width: u32) -> oneshot::Sender<OcrReply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().insert(width, rx);
            tx
        }
    }

    #[async_trait]
    impl OcrProvider for ScriptedOcr {
        async fn recognize(&self, request: OcrRequest) -> Result<Vec<DetectedTextBlock>, OcrError> {
            let reply = self.replies.lock().remove(&request.image.width());
            match reply {
                Some(rx) => rx.await.unwrap_or(Err(OcrError::Abandoned)),
                None => Err(OcrError::Backend("unexpected request".to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Answers translations in order with whatever the test sends
    struct ScriptedTranslator {
        replies: Mutex<VecDeque<oneshot::Receiver<TranslationReply>>>,
    }

    impl ScriptedTranslator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
            })
        }

        fn expect(&self) -> oneshot::Sender<TranslationReply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl TranslationProvider for ScriptedTranslator {
        async fn translate(&self, text: &str, _mode: TranslationMode) -> Result<String, TranslationError> {
            if text == "panic" {
                panic!("translator crashed");
            }
            let reply = self.replies.lock().pop_front();
            match reply {
                Some(rx) => rx.await.unwrap_or(Err(TranslationError::Abandoned)),
                None => Err(TranslationError::Model("unexpected request".to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Fixture {
        _runtime: Runtime,
        session: LensSession,
        ocr: Arc<ScriptedOcr>,
        translator: Arc<ScriptedTranslator>,
    }

    fn fixture() -> Fixture {
        let runtime = Runtime::new().unwrap();
        let ocr = ScriptedOcr::new();
        let translator = ScriptedTranslator::new();
        let session = LensSession::new(
            ocr.clone(),
            translator.clone(),
            TranslationMode::ChineseToEnglish,
            runtime.handle().clone(),
        );
        Fixture {
            _runtime: runtime,
            session,
            ocr,
            translator,
        }
    }

    fn frame(width: u32, height: u32) -> CapturedFrame {
        CapturedFrame::new(RgbaImage::new(width, height), Rotation::None)
    }

    fn block(text: &str, left: f32, top: f32, right: f32, bottom: f32) -> DetectedTextBlock {
        DetectedTextBlock::new(text, Rect::new(left, top, right, bottom))
    }

    /// Capture a 1000x2000 frame shown at 500x800 with two detected blocks
    fn with_annotations(fx: &mut Fixture) {
        fx.session.set_view_size(ViewSize::new(500.0, 800.0));
        let reply = fx.ocr.expect(1000);
        fx.session.capture(frame(1000, 2000), None);
        reply
            .send(Ok(vec![
                block("学校", 100.0, 200.0, 300.0, 400.0),
                block("欢迎", 500.0, 1000.0, 700.0, 1100.0),
            ]))
            .unwrap();
        assert_eq!(fx.session.pump_timeout(WAIT), 1);
        assert_eq!(fx.session.store().current_annotations().len(), 2);
    }

    #[test]
    fn test_capture_maps_blocks_into_view() {
        let mut fx = fixture();
        with_annotations(&mut fx);

        let annotations = fx.session.store().current_annotations();
        assert_eq!(annotations[0].bounding_box, Rect::new(50.0, 80.0, 150.0, 160.0));
        assert_eq!(annotations[1].bounding_box, Rect::new(250.0, 400.0, 350.0, 440.0));
        assert!(matches!(
            fx.session.ocr_status(),
            OcrStatus::Done { blocks: 2, .. }
        ));
    }

    #[test]
    fn test_empty_blocks_are_dropped() {
        let mut fx = fixture();
        fx.session.set_view_size(ViewSize::new(100.0, 100.0));
        let reply = fx.ocr.expect(100);
        fx.session.capture(frame(100, 100), None);
        reply
            .send(Ok(vec![block("  ", 0.0, 0.0, 10.0, 10.0), block("字", 20.0, 20.0, 30.0, 30.0)]))
            .unwrap();
        fx.session.pump_timeout(WAIT);

        let annotations = fx.session.store().current_annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].text, "字");
    }

    #[test]
    fn test_stale_ocr_result_is_discarded() {
        let mut fx = fixture();
        fx.session.set_view_size(ViewSize::new(100.0, 100.0));

        let first = fx.ocr.expect(200);
        let second = fx.ocr.expect(400);
        fx.session.capture(frame(200, 200), None);
        let current = fx.session.capture(frame(400, 400), None);

        first.send(Ok(vec![block("旧", 0.0, 0.0, 50.0, 50.0)])).unwrap();
        assert_eq!(fx.session.pump_timeout(WAIT), 1);
        assert!(fx.session.store().current_annotations().is_empty());
        assert_eq!(fx.session.ocr_status(), &OcrStatus::Recognizing(current));

        second.send(Ok(vec![block("新", 0.0, 0.0, 200.0, 200.0)])).unwrap();
        fx.session.pump_timeout(WAIT);
        let annotations = fx.session.store().current_annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].text, "新");
        assert_eq!(annotations[0].bounding_box, Rect::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn test_result_after_reset_is_discarded() {
        let mut fx = fixture();
        let reply = fx.ocr.expect(100);
        fx.session.capture(frame(100, 100), None);
        fx.session.reset();

        reply.send(Ok(vec![block("字", 0.0, 0.0, 10.0, 10.0)])).unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(fx.session.store().current_annotations().is_empty());
        assert!(fx.session.store().image().is_none());
        assert_eq!(fx.session.ocr_status(), &OcrStatus::Idle);
    }

    #[test]
    fn test_ocr_failure_leaves_no_annotations() {
        let mut fx = fixture();
        let reply = fx.ocr.expect(100);
        let generation = fx.session.capture(frame(100, 100), None);

        reply.send(Err(OcrError::Backend("engine crashed".to_string()))).unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(fx.session.store().current_annotations().is_empty());
        assert!(fx.session.store().image().is_some());
        match fx.session.ocr_status() {
            OcrStatus::Failed { generation: g, error } => {
                assert_eq!(*g, generation);
                assert!(error.contains("engine crashed"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_rotated_capture_is_shown_upright() {
        let mut fx = fixture();
        let reply = fx.ocr.expect(200);
        fx.session
            .capture(CapturedFrame::new(RgbaImage::new(100, 200), Rotation::Cw90), None);
        drop(reply);

        let image = fx.session.store().image().unwrap();
        assert_eq!(image.dimensions(), (200, 100));
    }

    #[test]
    fn test_tap_outside_every_box_is_a_miss() {
        let mut fx = fixture();
        with_annotations(&mut fx);

        assert_eq!(fx.session.tap(Point::new(10.0, 10.0)), TapOutcome::Miss);
        assert!(!fx.session.is_translating());
        assert_eq!(fx.session.translation(), &TranslationStatus::Idle);
    }

    #[test]
    fn test_tap_translates_hit_text() {
        let mut fx = fixture();
        with_annotations(&mut fx);
        let reply = fx.translator.expect();

        let outcome = fx.session.tap(Point::new(100.0, 100.0));
        assert!(matches!(&outcome, TapOutcome::Started { text, .. } if text == "学校"));
        assert_eq!(fx.session.translation().output_text(), "Translating:\n学校");

        reply.send(Ok("School".to_string())).unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(!fx.session.is_translating());
        assert_eq!(fx.session.translation().output_text(), "Translation result:\nSchool");
    }

    #[test]
    fn test_second_tap_is_ignored_while_busy() {
        let mut fx = fixture();
        with_annotations(&mut fx);
        let reply = fx.translator.expect();

        assert!(matches!(fx.session.tap(Point::new(100.0, 100.0)), TapOutcome::Started { .. }));
        assert_eq!(fx.session.tap(Point::new(300.0, 420.0)), TapOutcome::Busy);
        assert_eq!(fx.session.translation().output_text(), "Translating:\n学校");

        reply.send(Ok("School".to_string())).unwrap();
        fx.session.pump_timeout(WAIT);

        let next = fx.translator.expect();
        assert!(matches!(
            fx.session.tap(Point::new(300.0, 420.0)),
            TapOutcome::Started { text, .. } if text == "欢迎"
        ));
        next.send(Ok("Welcome".to_string())).unwrap();
        fx.session.pump_timeout(WAIT);
        assert_eq!(fx.session.translation().output_text(), "Translation result:\nWelcome");
    }

    #[test]
    fn test_failed_translation_reopens_gate() {
        let mut fx = fixture();
        with_annotations(&mut fx);
        let reply = fx.translator.expect();

        fx.session.tap(Point::new(100.0, 100.0));
        reply
            .send(Err(TranslationError::Unavailable("model not found".to_string())))
            .unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(!fx.session.is_translating());
        assert!(matches!(fx.session.translation(), TranslationStatus::Failed { error, .. } if error.contains("model not found")));

        let _next = fx.translator.expect();
        assert!(matches!(fx.session.tap(Point::new(100.0, 100.0)), TapOutcome::Started { .. }));
    }

    #[test]
    fn test_panicking_translator_still_releases_gate() {
        let mut fx = fixture();
        fx.session.set_view_size(ViewSize::new(100.0, 100.0));
        let reply = fx.ocr.expect(100);
        fx.session.capture(frame(100, 100), None);
        reply.send(Ok(vec![block("panic", 0.0, 0.0, 100.0, 100.0)])).unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(matches!(fx.session.tap(Point::new(50.0, 50.0)), TapOutcome::Started { .. }));
        assert_eq!(fx.session.pump_timeout(WAIT), 1);

        assert!(!fx.session.is_translating());
        assert!(matches!(fx.session.translation(), TranslationStatus::Failed { .. }));
    }

    #[test]
    fn test_translation_after_reset_is_not_shown() {
        let mut fx = fixture();
        with_annotations(&mut fx);
        let reply = fx.translator.expect();

        fx.session.tap(Point::new(100.0, 100.0));
        fx.session.reset();
        assert!(fx.session.is_translating());

        reply.send(Ok("School".to_string())).unwrap();
        fx.session.pump_timeout(WAIT);

        assert!(!fx.session.is_translating());
        assert_eq!(fx.session.translation().output_text(), "");
    }

    #[test]
    fn test_draw_list_follows_state() {
        let mut fx = fixture();
        let style = HighlightStyle::default();
        assert!(fx.session.draw_list(&style).is_empty());

        with_annotations(&mut fx);
        let commands = fx.session.draw_list(&style);
        assert_eq!(commands.len(), 3);
        assert_eq!(
            commands[0],
            DrawCommand::Image {
                dest: Rect::new(0.0, 0.0, 500.0, 800.0)
            }
        );
    }
}
