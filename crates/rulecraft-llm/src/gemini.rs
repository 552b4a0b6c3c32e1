use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::client::TextGenerator;
use crate::errors::LlmError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Connection settings for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// Falls back to `GEMINI_API_KEY` when unset.
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

impl GeminiSettings {
    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: Option<f32>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .finish()
    }
}

impl GeminiClient {
    /// Build a client, failing before any request when credentials are missing.
    pub fn new(settings: &GeminiSettings) -> Result<Self, LlmError> {
        let api_key = settings.resolve_api_key().ok_or_else(|| {
            LlmError::Configuration(format!(
                "gemini api key not found in settings or {API_KEY_ENV}"
            ))
        })?;

        let endpoint = settings.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(LlmError::Configuration("gemini endpoint is empty".to_string()));
        }

        let model = settings.model.trim().to_string();
        if model.is_empty() {
            return Err(LlmError::Configuration("gemini model is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| LlmError::Configuration(format!("failed to create http client: {err}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
            temperature: settings.temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| LlmError::Request(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
                body.first_text().ok_or_else(|| {
                    LlmError::InvalidResponse("response has no candidate text".to_string())
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let body = response.text().await.unwrap_or_default();
                Err(LlmError::RateLimited(body))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LlmError::Configuration(
                "gemini rejected the api key".to_string(),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LlmError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|part| part.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}
