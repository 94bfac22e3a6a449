//! Conversation controller: session state machine and append-only turn log.
//!
//! All mutable state of one interactive session lives here — the
//! conversation log, the index handle, and the effective retrieval
//! parameters — initialized per session and dropped on exit. Nothing is
//! shared across sessions except the read-only [`IndexCache`](crate::index::IndexCache)
//! entries keyed by credential and document fingerprint.
//!
//! State machine (document Q&A flow):
//!
//! ```text
//! empty ──upload──▶ awaiting_index ──index built──▶ ready
//!                        │                            │ ▲
//!                        └──build failed (no prior)   ▼ │
//!                                            answering ─┘ (complete or fail)
//! clear: any state ──▶ empty (index and log discarded together)
//! ```

use std::sync::Arc;

use crate::index::VectorIndex;
use crate::models::{Citation, Turn};

/// Lifecycle states of a document Q&A session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No documents, no index, no pending work.
    Empty,
    /// Documents uploaded; index not yet built.
    AwaitingIndex,
    /// Index built; accepting questions.
    Ready,
    /// A question is in flight.
    Answering,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Empty => "empty",
            SessionState::AwaitingIndex => "awaiting_index",
            SessionState::Ready => "ready",
            SessionState::Answering => "answering",
        };
        write!(f, "{}", s)
    }
}

/// Why a question was rejected without reaching the pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum NotReady {
    /// No knowledge base yet.
    NoIndex,
    /// An upload is being processed.
    IndexPending,
    /// A previous question is still in flight.
    Busy,
}

impl std::fmt::Display for NotReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReady::NoIndex => write!(f, "load documents first"),
            NotReady::IndexPending => write!(f, "the knowledge base is still being built"),
            NotReady::Busy => write!(f, "a question is already being answered"),
        }
    }
}

/// One interactive session: state, conversation log, and index handle.
pub struct Session {
    state: SessionState,
    turns: Vec<Turn>,
    index: Option<Arc<VectorIndex>>,
}

impl Session {
    pub fn new() -> Session {
        Session {
            state: SessionState::Empty,
            turns: Vec::new(),
            index: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn index(&self) -> Option<&Arc<VectorIndex>> {
        self.index.as_ref()
    }

    /// Documents arrived; index construction starts.
    pub fn begin_upload(&mut self) {
        self.state = SessionState::AwaitingIndex;
    }

    /// Index construction succeeded. The new index replaces any previous one
    /// entirely; the conversation log is untouched.
    pub fn attach_index(&mut self, index: Arc<VectorIndex>) {
        self.index = Some(index);
        self.state = SessionState::Ready;
    }

    /// Index construction failed. No partial index is retained; a previously
    /// built index (if any) stays usable.
    pub fn abort_upload(&mut self) {
        self.state = if self.index.is_some() {
            SessionState::Ready
        } else {
            SessionState::Empty
        };
    }

    /// Gate a question: only a `Ready` session may answer, and the index must
    /// exist and be non-empty before anything is embedded or sent to a model.
    pub fn begin_answer(&mut self) -> Result<Arc<VectorIndex>, NotReady> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Empty => return Err(NotReady::NoIndex),
            SessionState::AwaitingIndex => return Err(NotReady::IndexPending),
            SessionState::Answering => return Err(NotReady::Busy),
        }
        let index = match &self.index {
            Some(index) if !index.is_empty() => index.clone(),
            _ => return Err(NotReady::NoIndex),
        };
        self.state = SessionState::Answering;
        Ok(index)
    }

    /// Record a successful grounded exchange and return to `Ready`.
    pub fn complete_answer(
        &mut self,
        question: String,
        answer: String,
        sources: Option<Vec<Citation>>,
    ) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer, sources));
        self.state = SessionState::Ready;
    }

    /// A generation attempt failed: the log stays exactly as it was, and the
    /// session returns to `Ready` for a retry.
    pub fn fail_answer(&mut self) {
        self.state = SessionState::Ready;
    }

    /// Append a plain (ungrounded) exchange. Used by the chat and agent modes,
    /// which have no index lifecycle.
    pub fn record_exchange(&mut self, question: String, answer: String) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer, None));
    }

    /// Discard the knowledge base and the conversation together.
    pub fn clear(&mut self) {
        self.index = None;
        self.turns.clear();
        self.state = SessionState::Empty;
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
