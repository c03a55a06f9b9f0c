use crate::defaults;
use crate::delivery::client::DeliveryMode;
use crate::error::{FacetalkError, Result};
use crate::llm::CompletionKind;
use crate::stt::RecognizerKind;
use crate::text::splitter::SplitterKind;
use crate::tts::SynthesizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub recognition: RecognitionConfig,
    pub completion: CompletionConfig,
    pub synthesis: SynthesisConfig,
    pub delivery: DeliveryConfig,
    pub pipeline: PipelineSettings,
}

/// Speech recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    pub engine: RecognizerKind,
    pub language: String,
    pub sample_rate: u32,
    pub sensitivity: Sensitivity,
    /// Overrides the engine's default endpoint.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
}

/// Language model completion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub engine: CompletionKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub max_context_length: usize,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub engine: SynthesizerKind,
    pub language: String,
    pub splitter: SplitterKind,
    /// Voice or speaker id passed to the engine, if it supports one.
    pub voice: Option<String>,
    /// Engine model name, if it supports one.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

/// Audio delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    pub url: String,
    pub instance_name: String,
    pub mode: DeliveryMode,
    /// Streamed chunk size is `samplerate / chunks_per_second` samples.
    pub chunks_per_second: u32,
    /// Pause between two streamed chunks, in milliseconds.
    pub chunk_delay_ms: u64,
    pub block_until_playback_is_finished: bool,
    pub status_url: String,
}

/// Stage worker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub poll_interval_ms: u64,
}

/// Microphone sensitivity, mapped to an energy threshold for the recognizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Energy threshold (RMS on the 16-bit sample scale).
    pub fn energy_threshold(self) -> f32 {
        match self {
            Sensitivity::Low => defaults::ENERGY_THRESHOLD_LOW,
            Sensitivity::Medium => defaults::ENERGY_THRESHOLD_MEDIUM,
            Sensitivity::High => defaults::ENERGY_THRESHOLD_HIGH,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            engine: RecognizerKind::GoogleWebSpeech,
            language: defaults::RECOGNITION_LANGUAGE.to_string(),
            sample_rate: defaults::SAMPLE_RATE,
            sensitivity: Sensitivity::default(),
            base_url: None,
            api_key_env: None,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            engine: CompletionKind::OpenAi,
            model: defaults::COMPLETION_MODEL.to_string(),
            max_tokens: defaults::MAX_TOKENS,
            temperature: defaults::TEMPERATURE,
            system_prompt: defaults::SYSTEM_PROMPT.to_string(),
            max_context_length: defaults::MAX_CONTEXT_LENGTH,
            base_url: None,
            api_key_env: None,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            engine: SynthesizerKind::Coqui,
            language: defaults::SYNTHESIS_LANGUAGE.to_string(),
            splitter: SplitterKind::Regex,
            voice: None,
            model: None,
            base_url: None,
            api_key_env: None,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            url: defaults::DELIVERY_URL.to_string(),
            instance_name: defaults::INSTANCE_NAME.to_string(),
            mode: DeliveryMode::SinglePush,
            chunks_per_second: defaults::CHUNKS_PER_SECOND,
            chunk_delay_ms: defaults::CHUNK_DELAY_MS,
            block_until_playback_is_finished: true,
            status_url: defaults::STATUS_URL.to_string(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl DeliveryConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl PipelineSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FacetalkError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                FacetalkError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(FacetalkError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FACETALK_LANGUAGE → recognition.language and synthesis.language
    /// - FACETALK_MODEL → completion.model
    /// - FACETALK_A2F_URL → delivery.url
    /// - FACETALK_INSTANCE_NAME → delivery.instance_name
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("FACETALK_LANGUAGE")
            && !language.is_empty()
        {
            self.recognition.language = language.clone();
            self.synthesis.language = language;
        }

        if let Ok(model) = std::env::var("FACETALK_MODEL")
            && !model.is_empty()
        {
            self.completion.model = model;
        }

        if let Ok(url) = std::env::var("FACETALK_A2F_URL")
            && !url.is_empty()
        {
            self.delivery.url = url;
        }

        if let Ok(instance) = std::env::var("FACETALK_INSTANCE_NAME")
            && !instance.is_empty()
        {
            self.delivery.instance_name = instance;
        }

        self
    }

    /// Check value ranges the type system can't express.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> FacetalkError {
            FacetalkError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.recognition.sample_rate == 0 {
            return Err(invalid("recognition.sample_rate", "must be greater than zero"));
        }
        if self.completion.model.trim().is_empty() {
            return Err(invalid("completion.model", "must not be empty"));
        }
        if self.completion.max_tokens == 0 {
            return Err(invalid("completion.max_tokens", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(invalid("completion.temperature", "must be between 0.0 and 2.0"));
        }
        if self.completion.max_context_length == 0 {
            return Err(invalid(
                "completion.max_context_length",
                "must be greater than zero",
            ));
        }
        if self.delivery.chunks_per_second == 0 {
            return Err(invalid(
                "delivery.chunks_per_second",
                "must be greater than zero",
            ));
        }
        if self.delivery.url.trim().is_empty() {
            return Err(invalid("delivery.url", "must not be empty"));
        }
        if self.delivery.instance_name.trim().is_empty() {
            return Err(invalid("delivery.instance_name", "must not be empty"));
        }
        if self.pipeline.poll_interval_ms == 0 {
            return Err(invalid("pipeline.poll_interval_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/facetalk/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facetalk")
            .join("config.toml")
    }

    /// Render the effective configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FacetalkError::ConfigParse {
            message: e.to_string(),
        })
    }
}

/// Read an API key from the named environment variable.
pub(crate) fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.trim().is_empty())
}
