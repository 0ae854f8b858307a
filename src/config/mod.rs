//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::Rotation;
use crate::lens::HighlightStyle;
use crate::translate::TranslationMode;
use crate::vision::{OcrBackend, OcrGranularity};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture settings
    pub capture: CaptureSettings,
    /// OCR settings
    pub ocr: OcrSettings,
    /// Translation settings
    pub translation: TranslationSettings,
    /// Overlay settings
    pub overlay: OverlaySettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Clockwise rotation applied to frames that do not specify one
    pub rotation: Rotation,
}

/// OCR-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Which OCR provider to use
    pub backend: OcrBackend,
    /// Recognition language tag (Windows OCR)
    pub language: String,
    /// Word- or line-level blocks
    pub granularity: OcrGranularity,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::default(),
            language: "zh-Hans-CN".to_string(),
            granularity: OcrGranularity::Line,
        }
    }
}

/// Translation-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Base URL of the Ollama-compatible server
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Language pair
    pub mode: TranslationMode,
    /// Request timeout; none means wait indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5:0.5b".to_string(),
            mode: TranslationMode::ChineseToEnglish,
            timeout_secs: None,
        }
    }
}

/// Overlay-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Highlight fill as RGBA
    pub highlight_color: [u8; 4],
    /// Font with CJK coverage, used where the built-in fonts have no glyph
    pub font_path: Option<PathBuf>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            highlight_color: HighlightStyle::default().fill,
            font_path: None,
        }
    }
}

impl OverlaySettings {
    pub fn highlight_style(&self) -> HighlightStyle {
        HighlightStyle {
            fill: self.highlight_color,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("me", "translatorlens", "TranslatorLens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
