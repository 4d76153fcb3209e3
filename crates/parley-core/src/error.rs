use thiserror::Error;

/// Failure talking to the language model. Every variant surfaces to callers
/// as [`ChatError::ModelUnavailable`].
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out")]
    Timeout,

    #[error("model transport error: {0}")]
    Transport(String),

    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The chat (or user) does not exist, or is not owned by the requester.
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("model unavailable: {0}")]
    ModelUnavailable(#[source] ModelError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ModelError> for ChatError {
    fn from(e: ModelError) -> Self {
        ChatError::ModelUnavailable(e)
    }
}
