use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

/// Closed error taxonomy for remote model and embedding calls. Callers switch
/// on the variant (or on `is_transient`) instead of string-matching provider
/// error payloads.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("content blocked by safety filter: {0}")]
    SafetyBlocked(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("malformed structured output: {0}")]
    Malformed(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl AiError {
    /// Errors worth retrying with backoff. Safety blocks and malformed output
    /// are handled separately by callers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited(_)
                | AiError::Unavailable(_)
                | AiError::Timeout
                | AiError::Internal(_)
                | AiError::Network(_)
        )
    }

    /// Short stable name for the error kind, used in fallback annotations
    /// and run statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::RateLimited(_) => "RateLimited",
            AiError::Unavailable(_) => "Unavailable",
            AiError::Timeout => "Timeout",
            AiError::Internal(_) => "Internal",
            AiError::Network(_) => "Network",
            AiError::SafetyBlocked(_) => "SafetyBlocked",
            AiError::EmptyResponse => "EmptyResponse",
            AiError::Malformed(_) => "Malformed",
            AiError::Api { .. } => "Api",
        }
    }

    /// Map an HTTP error status + body to the right variant.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => AiError::RateLimited(message),
            503 | 529 => AiError::Unavailable(message),
            500..=599 => AiError::Internal(message),
            _ => AiError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Network(err.to_string())
        }
    }
}
