//! Local LLM via Ollama
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint. The model is
//! warmed up in the background at construction; requests wait on the
//! readiness signal and then stream the answer, concatenating the partial
//! chunks into one final string. After a failed warm-up the next request
//! starts another one, so a server that comes up late is picked up.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::TranslationSettings;
use crate::translate::{
    ready_channel, Readiness, ReadySignal, ReadyWaiter, TranslationError, TranslationMode, TranslationProvider,
};

/// One line of Ollama's NDJSON stream
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Reassembles NDJSON chunks that may be split across network reads
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the response body
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), TranslationError> {
        self.pending.extend_from_slice(bytes);
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.consume_line(&line)?;
        }
        Ok(())
    }

    /// Flush any trailing line and return the full text
    pub fn finish(mut self) -> Result<String, TranslationError> {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest)?;
        if !self.done {
            debug!("Stream ended without a done marker");
        }
        Ok(self.text)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), TranslationError> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let chunk: GenerateChunk = serde_json::from_str(line)?;
        if let Some(error) = chunk.error {
            return Err(TranslationError::Model(error));
        }
        self.text.push_str(&chunk.response);
        self.done |= chunk.done;
        Ok(())
    }
}

/// Translation provider backed by a local Ollama server
pub struct OllamaTranslator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    signal: ReadySignal,
    ready: ReadyWaiter,
    /// Runtime that runs warm-up attempts
    runtime: Handle,
}

impl OllamaTranslator {
    /// Build the client and start loading the model on `runtime`
    pub fn spawn(settings: &TranslationSettings, runtime: &Handle) -> Result<Self, TranslationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let endpoint = format!("{}/api/generate", settings.endpoint.trim_end_matches('/'));
        let (signal, ready) = ready_channel();

        let translator = Self {
            client,
            endpoint,
            model: settings.model.clone(),
            signal,
            ready,
            runtime: runtime.clone(),
        };
        translator.start_warm_up();
        Ok(translator)
    }

    /// Current model loading state
    pub fn readiness(&self) -> Readiness {
        self.ready.current()
    }

    fn start_warm_up(&self) {
        let attempt = self.signal.attempt();
        let warm_up = warm_up(self.client.clone(), self.endpoint.clone(), self.model.clone());
        self.runtime.spawn(async move {
            match warm_up.await {
                Ok(()) => attempt.ready(),
                Err(e) => {
                    warn!("Failed to load translation model: {}", e);
                    attempt.fail(e.to_string());
                }
            }
        });
    }
}

/// An empty prompt makes Ollama load the model without generating
async fn warm_up(client: reqwest::Client, endpoint: String, model: String) -> Result<(), TranslationError> {
    let start = Instant::now();
    info!("Loading translation model {}", model);

    let body = serde_json::json!({
        "model": model,
        "prompt": "",
        "stream": false
    });
    let resp = client.post(&endpoint).json(&body).send().await?;
    check_status(resp).await?;

    info!("Translation model {} ready in {:?}", model, start.elapsed());
    Ok(())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TranslationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|json| json["error"].as_str().map(str::to_string))
        .unwrap_or(text);
    Err(TranslationError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TranslationProvider for OllamaTranslator {
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, TranslationError> {
        if self.signal.rearm() {
            info!("Retrying translation model load");
            self.start_warm_up();
        }
        self.ready.wait().await?;

        let body = serde_json::json!({
            "model": self.model,
            "system": mode.instruction(),
            "prompt": text,
            "stream": true
        });

        let start = Instant::now();
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let resp = check_status(resp).await?;

        let mut assembler = ChunkAssembler::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            assembler.push(&chunk?)?;
            if assembler.is_done() {
                break;
            }
        }
        let translated = assembler.finish()?;

        debug!("Translated {} chars in {:?}", text.chars().count(), start.elapsed());
        Ok(translated.trim().to_string())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
