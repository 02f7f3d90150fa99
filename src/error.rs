//! Error types for the classification & extraction engine.
//!
//! Malformed input is never an error: the pipeline degrades it to a
//! `needs_review` classification. Errors here cover the cases the caller
//! must act on (retry, fix the request).

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Feature store error: {0}")]
    Store(#[from] StoreError),

    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),
}

/// Feature store access errors. Fatal to the run; the caller should retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Revision {revision} not found (latest is {latest})")]
    RevisionNotFound { revision: u64, latest: u64 },
}

/// Feedback submission errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("No classification result with id {0}")]
    UnknownResult(Uuid),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
