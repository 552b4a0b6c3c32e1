use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationReport;

/// Core error type shared across rulecraft crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A document could not be read or written.
    #[error("persistence error at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A document is not valid JSON or cannot be decoded into the model.
    #[error("invalid json in {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A document is valid JSON but misses required attributes.
    #[error("invalid document {}: {report}", path.display())]
    Shape {
        path: PathBuf,
        report: ValidationReport,
    },
    /// A JSON Schema could not be compiled.
    #[error("schema error: {0}")]
    Schema(String),
    /// In-memory value could not be encoded.
    #[error("json encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results returned by rulecraft crates.
pub type Result<T> = std::result::Result<T, Error>;
