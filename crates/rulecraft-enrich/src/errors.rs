use rulecraft_llm::{LlmError, Retryable};
use thiserror::Error;

/// Errors that abort an enrichment run.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Core(#[from] rulecraft_core::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Failure to extract constraints for a single field.
///
/// Scoped to that field: the enricher records it and moves on.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("model call failed for field '{field}': {source}")]
    Model {
        field: String,
        #[source]
        source: LlmError,
    },
    #[error("model returned no constraints for field '{field}'")]
    Empty { field: String },
}

impl ExtractionError {
    /// The model refused the credential or configuration; no other field can succeed.
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

impl Retryable for ExtractionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Model { source, .. } => source.is_retryable(),
            Self::Empty { .. } => true,
        }
    }
}
