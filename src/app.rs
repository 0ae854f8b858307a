//! Lens window
//!
//! Hosts the session in an eframe window: a toolbar to capture or reset,
//! the frozen preview with highlighted text regions, and the output area
//! that shows the current translation.

use anyhow::{anyhow, Result};
use eframe::egui;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::capture::{self, Rotation};
use crate::config::AppConfig;
use crate::geometry::{Point, ViewSize};
use crate::lens::{self, Generation, HighlightStyle};
use crate::session::{LensSession, OcrStatus, TapOutcome};
use crate::theme::{self, ThemeColors};
use crate::translate::{OllamaTranslator, Readiness};
use crate::vision;

const ROTATIONS: [Rotation; 4] = [Rotation::None, Rotation::Cw90, Rotation::Cw180, Rotation::Cw270];

/// How often to look for provider results while work is outstanding
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct LensApp {
    session: LensSession,
    translator: Arc<OllamaTranslator>,
    style: HighlightStyle,
    font_path: Option<PathBuf>,
    /// Path typed into the toolbar
    image_path: String,
    rotation: Rotation,
    /// Preview texture and the generation it was uploaded for
    texture: Option<(Generation, egui::TextureHandle)>,
    /// Last capture error shown under the toolbar
    load_error: Option<String>,
    theme_applied: bool,
    // Dropped last so provider tasks outlive the session
    _runtime: Runtime,
}

impl LensApp {
    /// Build providers from `config` and start loading the translation model
    pub fn new(config: &AppConfig, initial_image: Option<PathBuf>) -> Result<Self> {
        let runtime = Runtime::new()?;

        let ocr = vision::create_provider(config.ocr.backend, &config.ocr)?;
        let translator = Arc::new(OllamaTranslator::spawn(&config.translation, runtime.handle())?);
        let session = LensSession::new(
            ocr,
            translator.clone(),
            config.translation.mode,
            runtime.handle().clone(),
        );

        let mut app = Self {
            session,
            translator,
            style: config.overlay.highlight_style(),
            font_path: config.overlay.font_path.clone(),
            image_path: initial_image
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            rotation: config.capture.rotation,
            texture: None,
            load_error: None,
            theme_applied: false,
            _runtime: runtime,
        };

        if initial_image.is_some() {
            app.capture();
        }
        Ok(app)
    }

    /// Load the image at the toolbar path and hand it to the session
    fn capture(&mut self) {
        let path = PathBuf::from(self.image_path.trim());
        match capture::load_frame(&path, self.rotation) {
            Ok(frame) => {
                self.load_error = None;
                self.session.capture(frame, Some(path));
            }
            Err(e) => {
                error!("{:#}", e);
                self.load_error = Some(format!("{:#}", e));
            }
        }
    }

    fn reset(&mut self) {
        self.load_error = None;
        self.session.reset();
    }

    /// Upload the held image once per generation
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let Some(image) = self.session.store().image() else {
            self.texture = None;
            return;
        };
        if self.texture.as_ref().map(|(generation, _)| *generation) == Some(image.generation()) {
            return;
        }

        let max_side = ctx.input(|i| i.max_texture_side);
        let color_image = preview_image(image.pixels(), max_side);
        let texture = ctx.load_texture("lens_capture", color_image, egui::TextureOptions::LINEAR);
        self.texture = Some((image.generation(), texture));
    }

    /// Texture for the held image, if the uploaded one belongs to it
    fn current_texture(&self) -> Option<egui::TextureId> {
        let generation = self.session.store().image()?.generation();
        self.texture
            .as_ref()
            .filter(|(uploaded, _)| *uploaded == generation)
            .map(|(_, handle)| handle.id())
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Image:");
            let path_edit = ui.add(
                egui::TextEdit::singleline(&mut self.image_path)
                    .desired_width(360.0)
                    .hint_text("path/to/photo.png"),
            );
            let submitted = path_edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            egui::ComboBox::from_id_salt("rotation")
                .selected_text(format!("{}°", self.rotation.degrees()))
                .show_ui(ui, |ui| {
                    for rotation in ROTATIONS {
                        ui.selectable_value(&mut self.rotation, rotation, format!("{}°", rotation.degrees()));
                    }
                });

            if ui.button("Capture").clicked() || submitted {
                self.capture();
            }
            if ui.button("Reset").clicked() {
                self.reset();
            }

            ui.separator();
            ui.label(egui::RichText::new(self.session.mode().label()).color(ThemeColors::TEXT_SECONDARY));
            render_model_state(ui, &self.translator.readiness());
        });

        if let Some(err) = &self.load_error {
            ui.colored_label(ThemeColors::ACCENT_ERROR, err);
        }
        match self.session.ocr_status() {
            OcrStatus::Idle => {}
            OcrStatus::Recognizing(_) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(egui::RichText::new("Recognizing text...").color(ThemeColors::TEXT_MUTED));
                });
            }
            OcrStatus::Done { blocks, .. } => {
                ui.label(
                    egui::RichText::new(format!("{} text regions", blocks)).color(ThemeColors::TEXT_MUTED),
                );
            }
            OcrStatus::Failed { error, .. } => {
                ui.colored_label(ThemeColors::ACCENT_ERROR, format!("Text recognition failed: {}", error));
            }
        }
    }

    fn render_preview(&mut self, ui: &mut egui::Ui) {
        let size = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
        self.session.set_view_size(ViewSize::new(rect.width(), rect.height()));

        if self.session.store().image().is_none() {
            self.texture = None;
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No image captured",
                egui::FontId::proportional(18.0),
                ThemeColors::TEXT_MUTED,
            );
            return;
        }

        // After the toolbar, so a capture made this frame is already uploaded
        self.sync_texture(ui.ctx());

        let commands = self.session.draw_list(&self.style);
        lens::paint(ui.painter(), rect.min, &commands, self.current_texture());

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - rect.min;
                match self.session.tap(Point::new(local.x, local.y)) {
                    TapOutcome::Started { text, .. } => info!("Tapped {:?}", text),
                    TapOutcome::Busy | TapOutcome::Miss => {}
                }
            }
        }
    }

    fn render_output(&self, ui: &mut egui::Ui) {
        let text = self.session.translation().output_text();
        egui::ScrollArea::vertical()
            .max_height(160.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                if text.is_empty() {
                    ui.label(
                        egui::RichText::new("Tap a highlighted region to translate it")
                            .color(ThemeColors::TEXT_MUTED),
                    );
                } else {
                    ui.label(egui::RichText::new(text).color(ThemeColors::TEXT_PRIMARY));
                }
            });
    }

    /// Create eframe options for the lens window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([900.0, 760.0])
                .with_min_inner_size([480.0, 400.0])
                .with_title("Translator Lens"),
            ..Default::default()
        }
    }
}

/// Pixels for the preview texture, shrunk so neither side exceeds `max_side`.
///
/// The texture is stretched over the whole view, so a smaller upload keeps
/// the highlights aligned.
fn preview_image(image: &RgbaImage, max_side: usize) -> egui::ColorImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height) as usize;
    if longest <= max_side || longest == 0 {
        return egui::ColorImage::from_rgba_unmultiplied([width as usize, height as usize], image.as_raw());
    }

    let scale = max_side as f64 / longest as f64;
    let fit = |len: u32| ((len as f64 * scale).round() as u32).clamp(1, max_side as u32);
    let (new_width, new_height) = (fit(width), fit(height));
    debug!(
        "Downscaling preview {}x{} to {}x{} (max texture side {})",
        width, height, new_width, new_height, max_side
    );

    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);
    egui::ColorImage::from_rgba_unmultiplied([new_width as usize, new_height as usize], resized.as_raw())
}

fn render_model_state(ui: &mut egui::Ui, readiness: &Readiness) {
    match readiness {
        Readiness::Loading => {
            ui.colored_label(ThemeColors::ACCENT_WARNING, "Loading model...");
        }
        Readiness::Ready => {
            ui.colored_label(ThemeColors::ACCENT_SUCCESS, "Model ready");
        }
        Readiness::Failed(reason) => {
            ui.colored_label(ThemeColors::ACCENT_ERROR, "Model unavailable")
                .on_hover_text(reason);
        }
    }
}

impl eframe::App for LensApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            theme::apply_theme(ctx);
            if let Some(path) = &self.font_path {
                if let Err(e) = theme::install_fallback_font(ctx, path) {
                    warn!("{:#}", e);
                }
            }
            self.theme_applied = true;
        }

        self.session.pump();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_toolbar(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("output").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_output(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(ThemeColors::BG_DARK))
            .show(ctx, |ui| {
                self.render_preview(ui);
            });

        // Results arrive from runtime threads, so keep polling while any are due
        let waiting = matches!(self.session.ocr_status(), OcrStatus::Recognizing(_))
            || self.session.is_translating()
            || self.translator.readiness() == Readiness::Loading;
        if self.session.take_dirty() {
            ctx.request_repaint();
        } else if waiting {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}

/// Run the lens window until it is closed
pub fn run(config: AppConfig, initial_image: Option<&Path>) -> Result<()> {
    let app = LensApp::new(&config, initial_image.map(Path::to_path_buf))?;
    eframe::run_native(
        "Translator Lens",
        LensApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("Lens window failed: {}", e))
}
