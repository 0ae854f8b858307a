//! Windows OCR API backend
//!
//! Uses the built-in Windows OCR (Media.Ocr). Recognition runs on a blocking
//! thread; the WinRT async operation is awaited synchronously there.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use tracing::{debug, info, warn};
use windows::{
    core::HSTRING,
    Globalization::Language,
    Graphics::Imaging::{BitmapPixelFormat, SoftwareBitmap},
    Media::Ocr::{OcrEngine as WinOcrEngine, OcrResult as WinOcrResult},
};

use crate::geometry::Rect;
use crate::lens::DetectedTextBlock;
use crate::vision::{OcrError, OcrGranularity, OcrProvider, OcrRequest};

/// Windows OCR engine wrapper
pub struct WindowsOcr {
    engine: WinOcrEngine,
    language: String,
    granularity: OcrGranularity,
}

impl WindowsOcr {
    /// Create a new Windows OCR engine for a BCP-47 language tag
    pub fn new(language_tag: &str, granularity: OcrGranularity) -> Result<Self, OcrError> {
        Self::create(language_tag, granularity).map_err(backend_error)
    }

    fn create(language_tag: &str, granularity: OcrGranularity) -> Result<Self> {
        info!("Initializing Windows OCR engine with language: {}", language_tag);

        let language = Language::CreateLanguage(&HSTRING::from(language_tag))
            .context("Failed to create language")?;

        if !WinOcrEngine::IsLanguageSupported(&language)
            .context("Failed to check language support")?
        {
            warn!("Language '{}' not supported, falling back to user profile languages", language_tag);
            let engine = WinOcrEngine::TryCreateFromUserProfileLanguages()
                .context("Failed to create OCR engine from user profile")?;

            let lang_tag = engine
                .RecognizerLanguage()
                .context("Failed to get recognizer language")?
                .LanguageTag()
                .context("Failed to get language tag")?
                .to_string();

            info!("Windows OCR initialized with language: {}", lang_tag);
            return Ok(Self {
                engine,
                language: lang_tag,
                granularity,
            });
        }

        let engine = WinOcrEngine::TryCreateFromLanguage(&language)
            .context("Failed to create OCR engine for language")?;

        Ok(Self {
            engine,
            language: language_tag.to_string(),
            granularity,
        })
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl OcrProvider for WindowsOcr {
    async fn recognize(&self, request: OcrRequest) -> Result<Vec<DetectedTextBlock>, OcrError> {
        let engine = self.engine.clone();
        let granularity = self.granularity;
        debug!("Windows OCR ({}) at {:?} granularity", self.language(), granularity);

        tokio::task::spawn_blocking(move || recognize_blocking(&engine, &request.image, granularity))
            .await
            .map_err(|e| OcrError::Backend(format!("Windows OCR task failed: {}", e)))?
            .map_err(backend_error)
    }

    fn name(&self) -> &str {
        "windows"
    }
}

fn backend_error(error: anyhow::Error) -> OcrError {
    OcrError::Backend(format!("{:#}", error))
}

fn recognize_blocking(
    engine: &WinOcrEngine,
    image: &RgbaImage,
    granularity: OcrGranularity,
) -> Result<Vec<DetectedTextBlock>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(vec![]);
    }

    debug!("Windows OCR: Processing {}x{} image", width, height);

    // Windows expects BGRA
    let bgra_data = rgba_to_bgra(image.as_raw());
    let bitmap = create_software_bitmap(&bgra_data, width, height)?;

    let ocr_result = engine
        .RecognizeAsync(&bitmap)
        .context("Failed to start OCR recognition")?
        .get()
        .context("OCR recognition failed")?;

    let blocks = extract_blocks(&ocr_result, granularity)?;
    debug!("Windows OCR: Found {} text regions", blocks.len());
    Ok(blocks)
}

/// Convert RGBA to BGRA
fn rgba_to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut bgra = rgba.to_vec();
    for chunk in bgra.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
    bgra
}

/// Create a SoftwareBitmap from BGRA data using CopyFromBuffer
fn create_software_bitmap(bgra_data: &[u8], width: u32, height: u32) -> Result<SoftwareBitmap> {
    use windows::Storage::Streams::{DataReader, DataWriter, InMemoryRandomAccessStream};

    let stream = InMemoryRandomAccessStream::new().context("Failed to create in-memory stream")?;
    let writer = DataWriter::CreateDataWriter(&stream).context("Failed to create data writer")?;

    writer.WriteBytes(bgra_data).context("Failed to write pixel data")?;
    writer
        .StoreAsync()
        .context("Failed to start store operation")?
        .get()
        .context("Failed to store data")?;
    writer
        .FlushAsync()
        .context("Failed to start flush operation")?
        .get()
        .context("Failed to flush data")?;

    let bitmap = SoftwareBitmap::Create(BitmapPixelFormat::Bgra8, width as i32, height as i32)
        .context("Failed to create SoftwareBitmap")?;

    let input_stream = stream.GetInputStreamAt(0).context("Failed to get input stream")?;
    let reader = DataReader::CreateDataReader(&input_stream).context("Failed to create data reader")?;
    reader
        .LoadAsync(bgra_data.len() as u32)
        .context("Failed to start load operation")?
        .get()
        .context("Failed to load data")?;

    let buffer = reader
        .ReadBuffer(bgra_data.len() as u32)
        .context("Failed to read buffer")?;
    bitmap
        .CopyFromBuffer(&buffer)
        .context("Failed to copy buffer to bitmap")?;

    Ok(bitmap)
}

/// Extract text blocks in engine enumeration order
fn extract_blocks(ocr_result: &WinOcrResult, granularity: OcrGranularity) -> Result<Vec<DetectedTextBlock>> {
    let mut blocks = Vec::new();
    let lines = ocr_result.Lines().context("Failed to get OCR lines")?;

    for i in 0..lines.Size().context("Failed to get lines size")? {
        let line = lines.GetAt(i).context("Failed to get line")?;
        let words = line.Words().context("Failed to get words")?;
        let mut line_box: Option<Rect> = None;

        for j in 0..words.Size().context("Failed to get words size")? {
            let word = words.GetAt(j).context("Failed to get word")?;
            let rect = word.BoundingRect().context("Failed to get bounding rect")?;
            let word_box = Rect::from_xywh(rect.X, rect.Y, rect.Width, rect.Height);

            match granularity {
                OcrGranularity::Word => {
                    let text = word.Text().context("Failed to get word text")?.to_string();
                    blocks.push(DetectedTextBlock::new(text, word_box));
                }
                OcrGranularity::Line => {
                    line_box = Some(match line_box {
                        Some(acc) => Rect::new(
                            acc.left.min(word_box.left),
                            acc.top.min(word_box.top),
                            acc.right.max(word_box.right),
                            acc.bottom.max(word_box.bottom),
                        ),
                        None => word_box,
                    });
                }
            }
        }

        if let (OcrGranularity::Line, Some(bounds)) = (granularity, line_box) {
            let text = line.Text().context("Failed to get line text")?.to_string();
            blocks.push(DetectedTextBlock::new(text, bounds));
        }
    }

    Ok(blocks)
}
