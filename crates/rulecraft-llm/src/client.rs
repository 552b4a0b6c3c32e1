use async_trait::async_trait;

use crate::errors::LlmError;

/// Capability implemented by text generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier used for logs and reports.
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`, bounded by `max_output_tokens`.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, LlmError>;
}
