//! Error types for the hearing synchronization engine

use thiserror::Error;

/// Failure classes for hearing synchronization.
///
/// `Listing` is the structural class: the scheduling data violated an
/// invariant that needs a caseworker, not a retry. Dispatch is the only
/// component allowed to swallow it, and only after recording a listing
/// error event on the case.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Structural listing error. Carries the human-readable text that ends
    /// up on the recorded case error event.
    #[error("Listing error: {summary}")]
    Listing { summary: String, description: String },

    /// The case record changed between start and submit.
    #[error("Version conflict for case {case_id}: {message}")]
    Conflict { case_id: i64, message: String },

    /// Network or service failure talking to a collaborator.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Scheduling service call failed during orchestration; the case was
    /// not updated.
    #[error("Update case failed: {0}")]
    UpdateCase(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A hearing request carried a lifecycle state this engine cannot
    /// process.
    #[error("Unhandleable hearing state: {0}")]
    UnhandleableState(String),

    /// Dispatch queue is closed or full.
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Build a structural listing error.
    pub fn listing(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Listing {
            summary: summary.into(),
            description: description.into(),
        }
    }

    /// Whether this is the structural listing class that dispatch converts
    /// into a recorded case error event.
    pub fn is_listing(&self) -> bool {
        matches!(self, Self::Listing { .. })
    }

    /// Whether a retry of the whole start/mutate/submit sequence can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Transport(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

/// Result type alias for hearing-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
