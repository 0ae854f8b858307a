//! Readiness signal for lazily loaded models
//!
//! A load attempt resolves the signal to `Ready` or `Failed`; any number of
//! requests await it without polling. A failed signal can be re-armed back
//! to `Loading` so the next request starts a fresh attempt.

use std::sync::Arc;
use tokio::sync::watch;

use crate::translate::TranslationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Loading,
    Ready,
    Failed(String),
}

/// Resolving half, owned by the model holder
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<Readiness>>,
}

/// Awaiting half, cloned into every request
#[derive(Debug, Clone)]
pub struct ReadyWaiter {
    rx: watch::Receiver<Readiness>,
}

pub fn ready_channel() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = watch::channel(Readiness::Loading);
    (ReadySignal { tx: Arc::new(tx) }, ReadyWaiter { rx })
}

impl ReadySignal {
    pub fn ready(&self) {
        self.tx.send_replace(Readiness::Ready);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.tx.send_replace(Readiness::Failed(reason.into()));
    }

    /// Move a failed signal back to `Loading`.
    ///
    /// Returns `true` for exactly one caller per failure; that caller owns
    /// the next load attempt.
    pub fn rearm(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if matches!(state, Readiness::Failed(_)) {
                *state = Readiness::Loading;
                true
            } else {
                false
            }
        })
    }

    /// Guard for one load attempt
    pub fn attempt(&self) -> LoadAttempt {
        LoadAttempt {
            signal: Some(self.clone()),
        }
    }
}

/// One running load. Dropping it unresolved fails the signal, so waiters
/// never hang on a loader that died.
#[derive(Debug)]
pub struct LoadAttempt {
    signal: Option<ReadySignal>,
}

impl LoadAttempt {
    pub fn ready(mut self) {
        if let Some(signal) = self.signal.take() {
            signal.ready();
        }
    }

    pub fn fail(mut self, reason: impl Into<String>) {
        if let Some(signal) = self.signal.take() {
            signal.fail(reason);
        }
    }
}

impl Drop for LoadAttempt {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.fail("model loader exited before the model was ready");
        }
    }
}

impl ReadyWaiter {
    pub fn current(&self) -> Readiness {
        self.rx.borrow().clone()
    }

    /// Wait until the current load attempt resolves
    pub async fn wait(&self) -> Result<(), TranslationError> {
        let mut rx = self.rx.clone();
        let state = match rx.wait_for(|state| *state != Readiness::Loading).await {
            Ok(state) => state.clone(),
            // Every signal dropped without resolving
            Err(_) => Readiness::Failed("model loader exited before the model was ready".to_string()),
        };

        match state {
            Readiness::Ready => Ok(()),
            Readiness::Failed(reason) => Err(TranslationError::Unavailable(reason)),
            Readiness::Loading => Err(TranslationError::Unavailable("model is still loading".to_string())),
        }
    }
}
