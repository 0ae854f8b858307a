//! One-at-a-time translation gate
//!
//! A two-state machine: `Idle` accepts a new request, `InFlight` refuses
//! every request until the in-flight one reports back. Refused requests are
//! dropped, never queued.

use std::fmt;

/// Identifies one translation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "translation-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    InFlight(RequestId),
}

#[derive(Debug, Default)]
pub struct TranslationGate {
    state: GateState,
    issued: u64,
}

impl TranslationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `InFlight` and hand out a request id, or refuse when busy
    pub fn try_begin(&mut self) -> Option<RequestId> {
        match self.state {
            GateState::InFlight(_) => None,
            GateState::Idle => {
                self.issued += 1;
                let id = RequestId(self.issued);
                self.state = GateState::InFlight(id);
                Some(id)
            }
        }
    }

    /// Return to `Idle` if `id` is the request in flight.
    ///
    /// Reports from any other request are ignored and return `false`.
    pub fn finish(&mut self, id: RequestId) -> bool {
        if self.state == GateState::InFlight(id) {
            self.state = GateState::Idle;
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, GateState::InFlight(_))
    }
}
