//! Translation Layer
//!
//! Contract with the local language model: one string in, one string out,
//! asynchronously and with no latency bound. The caller enforces the
//! one-request-at-a-time rule with [`TranslationGate`].

pub mod gate;
pub mod ollama;
pub mod ready;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gate::{GateState, RequestId, TranslationGate};
pub use ollama::OllamaTranslator;
pub use ready::{ready_channel, Readiness, ReadySignal, ReadyWaiter};

/// Fixed language pair and the instruction that selects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum TranslationMode {
    #[default]
    #[serde(rename = "zh-en")]
    #[value(name = "zh-en")]
    ChineseToEnglish,
    #[serde(rename = "en-zh")]
    #[value(name = "en-zh")]
    EnglishToChinese,
}

impl TranslationMode {
    /// System instruction handed to the model
    pub fn instruction(&self) -> &'static str {
        match self {
            TranslationMode::ChineseToEnglish => "Translate from Chinese to English.",
            TranslationMode::EnglishToChinese => "将英文内容翻译为中文。",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TranslationMode::ChineseToEnglish => "zh → en",
            TranslationMode::EnglishToChinese => "en → zh",
        }
    }
}

/// Errors reported by a translation provider
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation model unavailable: {0}")]
    Unavailable(String),

    #[error("request to the language model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response from the language model: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("language model reported an error: {0}")]
    Model(String),

    #[error("translation request ended without a result")]
    Abandoned,
}

/// An external translation engine
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, TranslationError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}
