use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rulecraft_cases::DEFAULT_TEST_CASE_TOKENS;
use rulecraft_core::persist::write_bytes_atomic;
use rulecraft_enrich::DEFAULT_CONSTRAINT_TOKENS;
use rulecraft_llm::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, GeminiSettings, RetryPolicy};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml decode error in {}: {source}", path.display())]
    TomlDecode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    /// Falls back to `GEMINI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: None,
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

impl LlmSettings {
    pub fn gemini(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSettings {
    pub max_output_tokens: u32,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_CONSTRAINT_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateSettings {
    pub max_output_tokens: u32,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_TEST_CASE_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub processed_rules_file: PathBuf,
    pub constraints_processed_rules_file: PathBuf,
    pub generated_test_cases_file: PathBuf,
    pub test_case_keys_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            processed_rules_file: PathBuf::from("data/processed_rules.json"),
            constraints_processed_rules_file: PathBuf::from(
                "data/constraints_processed_rules.json",
            ),
            generated_test_cases_file: PathBuf::from("data/generated_test_cases.json"),
            test_case_keys_file: PathBuf::from("data/test_case_with_keys.json"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub retry: RetryPolicy,
    pub enrich: EnrichSettings,
    pub generate: GenerateSettings,
    pub paths: PathSettings,
}

pub fn load_or_create_settings(path: &Path) -> Result<Settings, SettingsError> {
    if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            toml::from_str(&content).map_err(|source| SettingsError::TomlDecode {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(settings);
    }

    let settings = Settings::default();
    save_settings(path, &settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(path, encoded.as_bytes()).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
