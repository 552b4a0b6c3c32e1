use rulecraft_llm::{LlmError, Retryable};
use thiserror::Error;

/// Errors that abort a test case stage.
#[derive(Debug, Error)]
pub enum CasesError {
    #[error(transparent)]
    Core(#[from] rulecraft_core::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Failure to generate test cases for a single field.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("model call failed for field '{field}': {source}")]
    Model {
        field: String,
        #[source]
        source: LlmError,
    },
    #[error("unparseable test cases for field '{field}': {message}")]
    Parse { field: String, message: String },
}

impl GenerationError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Model {
                source: LlmError::Configuration(_),
                ..
            }
        )
    }
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Model { source, .. } => source.is_retryable(),
            Self::Parse { .. } => true,
        }
    }
}
