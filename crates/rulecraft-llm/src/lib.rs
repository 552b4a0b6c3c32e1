//! Generative model access for rulecraft.
//!
//! Stages depend on the [`TextGenerator`] capability only; the Gemini REST
//! client is one implementation and tests substitute stubs.

pub mod client;
pub mod errors;
pub mod gemini;
pub mod retry;

pub use client::TextGenerator;
pub use errors::LlmError;
pub use gemini::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GeminiClient, GeminiSettings};
pub use retry::{RetryPolicy, Retryable};
