//! Translator Lens - tap-to-translate over a frozen camera frame
//!
//! Recognizes text in a captured image, highlights each region over the
//! preview, and sends the tapped region to a local language model.

mod app;
mod capture;
mod config;
mod error;
mod geometry;
mod lens;
mod session;
mod theme;
mod translate;
mod vision;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::capture::Rotation;
use crate::config::AppConfig;
use crate::translate::TranslationMode;
use crate::vision::OcrBackend;

/// Translator Lens - tap recognized text to translate it
#[derive(Parser, Debug)]
#[command(name = "translator-lens")]
#[command(about = "Highlight text in a photo and translate the region you tap")]
struct Args {
    /// Image to capture on startup
    image: Option<PathBuf>,

    /// Clockwise rotation that makes the image upright (0, 90, 180, 270)
    #[arg(short, long, value_parser = parse_rotation)]
    rotation: Option<Rotation>,

    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Translation direction
    #[arg(short, long, value_enum)]
    mode: Option<TranslationMode>,

    /// OCR backend
    #[arg(long, value_enum)]
    ocr: Option<OcrBackend>,
}

fn parse_rotation(value: &str) -> Result<Rotation, String> {
    let degrees: u32 = value
        .parse()
        .map_err(|_| format!("invalid rotation {:?}", value))?;
    Rotation::try_from(degrees)
}

fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Translator Lens starting...");

    let mut config = match &args.config {
        Some(path) => {
            let config = config::load_config(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => load_or_default_config(),
    };
    apply_overrides(&mut config, &args);

    app::run(config, args.image.as_deref())?;

    info!("Translator Lens shutdown complete");
    Ok(())
}

/// Load configuration from the user config directory, writing defaults on first run
fn load_or_default_config() -> AppConfig {
    let Ok(config_dir) = config::config_dir() else {
        info!("Using default configuration");
        return AppConfig::default();
    };

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        match config::load_config(&config_path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
            Err(e) => warn!("Ignoring configuration: {:#}", e),
        }
    } else {
        match config::save_config(&AppConfig::default(), &config_path) {
            Ok(()) => info!("Wrote default configuration to {:?}", config_path),
            Err(e) => warn!("Could not write default configuration: {:#}", e),
        }
    }

    info!("Using default configuration");
    AppConfig::default()
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(rotation) = args.rotation {
        config.capture.rotation = rotation;
    }
    if let Some(mode) = args.mode {
        config.translation.mode = mode;
    }
    if let Some(backend) = args.ocr {
        config.ocr.backend = backend;
    }
}
