use thiserror::Error;

/// Errors returned by text generation backends.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("llm configuration error: {0}")]
    Configuration(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Transport failures, rate limits and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Configuration(_) | Self::InvalidResponse(_) => false,
        }
    }
}
