use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::predictions::PredictionStatus;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid model name `{0}`, expected `owner/name`")]
    InvalidModelName(String),

    #[error("model `{0}` has no published version")]
    ModelVersionMissing(String),

    #[error("prediction {id} finished as {status}: {}", .error.as_deref().unwrap_or("no error detail"))]
    PredictionFailed {
        id: String,
        status: PredictionStatus,
        error: Option<String>,
    },

    #[error("prediction {id} still unfinished after {attempts} polls ({elapsed:?})")]
    PollTimeout {
        id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("prompt template error: {0}")]
    Template(String),
}

impl LlmError {
    /// Classifies a transport-level failure from `reqwest`.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return LlmError::InvalidResponse(error.to_string());
        }
        if let Some(status) = error.status() {
            return LlmError::from_status(status, error.to_string());
        }
        LlmError::ProviderUnavailable(error.to_string())
    }

    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LlmError::AuthenticationFailed(message)
            }
            StatusCode::TOO_MANY_REQUESTS => LlmError::ProviderUnavailable(message),
            status if status.is_server_error() => LlmError::ProviderUnavailable(message),
            status => LlmError::Api { status, message },
        }
    }
}
