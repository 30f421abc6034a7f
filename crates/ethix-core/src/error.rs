use thiserror::Error;

/// Failure of a single completion request. None of these are fatal; the
/// session turns them into a message for the user.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The endpoint answered 401.
    #[error("Invalid API key. Please check your Ethix IA API key.")]
    InvalidCredential,

    /// Any other non-2xx answer.
    #[error("API request failed: {status} {status_text}")]
    RequestFailed { status: u16, status_text: String },

    /// Connection failure or a body that could not be decoded.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CompletionError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return CompletionError::InvalidCredential;
        }
        CompletionError::RequestFailed {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}
