//! Conversation session: history, the in-flight guard and the last error
//!
//! A submission is split in two so a UI can run the network call on its own
//! task: [`Session::begin`] appends the user turn and hands back what the
//! request needs, [`Session::finish`] folds the outcome back in. Between the
//! two the session is in flight and further submissions are ignored.

use tracing::{debug, warn};

use crate::ai::CompletionBackend;
use crate::error::CompletionError;
use crate::state::ChatTurn;
use crate::store::MessageStore;

/// Everything the completion request needs for one submission
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Turns before the new user message, in order
    pub history: Vec<ChatTurn>,
    /// The trimmed user message
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Session {
    turns: MessageStore,
    in_flight: bool,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.turns.all()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a submission. Returns `None` for blank text or when a request
    /// is already running; the session is untouched in both cases.
    pub fn begin(&mut self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.in_flight {
            debug!("submission ignored, a request is already in flight");
            return None;
        }

        let history = self.turns.all().to_vec();
        if let Err(e) = self.turns.append(ChatTurn::user(text)) {
            warn!(error = %e, "could not record user turn");
            return None;
        }

        self.in_flight = true;
        self.last_error = None;

        Some(PendingTurn {
            history,
            text: text.to_string(),
        })
    }

    /// Record the outcome of the request started by [`Session::begin`].
    /// The user turn stays in the history on failure.
    pub fn finish(&mut self, result: Result<String, CompletionError>) {
        if !self.in_flight {
            warn!("completion result arrived with no request in flight, dropping it");
            return;
        }
        self.in_flight = false;

        match result {
            Ok(content) => {
                if let Err(e) = self.turns.append(ChatTurn::assistant(content)) {
                    warn!(error = %e, "could not record assistant turn");
                    self.last_error = Some(e.to_string());
                }
            }
            Err(e) => {
                warn!(error = %e, "completion failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Run one whole submission against `backend`. Returns whether the text
    /// was accepted.
    pub async fn submit<B>(&mut self, backend: &B, api_key: &str, text: &str) -> bool
    where
        B: CompletionBackend + ?Sized,
    {
        let Some(pending) = self.begin(text) else {
            return false;
        };

        let result = backend.complete(api_key, &pending.history, &pending.text).await;
        self.finish(result);
        true
    }
}
