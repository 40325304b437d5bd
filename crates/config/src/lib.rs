//! Configuration loading, validation, and management for threadkeeper.
//!
//! Loads configuration from `~/.threadkeeper/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Preamble sent ahead of every answer request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a Helpful Slack assistant. You give information about messages and threads in a Slack channel and help users find information. You can also accept questions and provide answers.";

/// Returned when a tool cannot produce anything useful.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm sorry, I'm not able to get this information right now.";

/// The root configuration structure.
///
/// Maps directly to `~/.threadkeeper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Memory and vector index configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Slack credentials and endpoint
    #[serde(default)]
    pub slack: SlackConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Assistant wording
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    700
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("embedding", &self.embedding)
            .field("memory", &self.memory)
            .field("slack", &self.slack)
            .field("gateway", &self.gateway)
            .field("assistant", &self.assistant)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("index_name", &self.index_name)
            .field("cloud", &self.cloud)
            .field("region", &self.region)
            .field("min_score", &self.min_score)
            .field("keyword_top_k", &self.keyword_top_k)
            .field("recent_count", &self.recent_count)
            .field("backfill_page_size", &self.backfill_page_size)
            .field("filtered_delete", &self.filtered_delete)
            .field("pinecone_api_key", &redact(&self.pinecone_api_key))
            .field("pinecone_api_url", &self.pinecone_api_url)
            .finish()
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("signing_secret", &redact(&self.signing_secret))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length every stored record must have
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimension() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "pinecone" or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default = "default_cloud")]
    pub cloud: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Matches scoring at or below this are discarded
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Neighbours fetched for keyword thread search
    #[serde(default = "default_keyword_top_k")]
    pub keyword_top_k: usize,

    /// Recent memories injected into answer requests
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,

    /// History messages fetched per channel during backfill
    #[serde(default = "default_backfill_page_size")]
    pub backfill_page_size: usize,

    /// Delete by exact `message_ts` match instead of by content similarity
    #[serde(default)]
    pub filtered_delete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_api_key: Option<String>,

    /// Control-plane URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_api_url: Option<String>,
}

fn default_memory_backend() -> String {
    "pinecone".into()
}
fn default_index_name() -> String {
    "threadkeeper".into()
}
fn default_cloud() -> String {
    "aws".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_min_score() -> f32 {
    0.5
}
fn default_keyword_top_k() -> usize {
    100
}
fn default_recent_count() -> usize {
    3
}
fn default_backfill_page_size() -> usize {
    500
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            index_name: default_index_name(),
            cloud: default_cloud(),
            region: default_region(),
            min_score: default_min_score(),
            keyword_top_k: default_keyword_top_k(),
            recent_count: default_recent_count(),
            backfill_page_size: default_backfill_page_size(),
            filtered_delete: false,
            pinecone_api_key: None,
            pinecone_api_url: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,

    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            api_url: default_slack_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            fallback_message: default_fallback_message(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.threadkeeper/config.toml).
    ///
    /// Environment variables override the file:
    /// - `THREADKEEPER_API_KEY`, then `OPENAI_API_KEY`
    /// - `THREADKEEPER_MODEL`
    /// - `PINECONE_API_KEY`
    /// - `SLACK_BOT_OAUTH_TOKEN`, `SLACK_SIGNING_SECRET`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("THREADKEEPER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(model) = lookup("THREADKEEPER_MODEL") {
            self.default_model = model;
        }

        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.memory.pinecone_api_key = Some(key);
        }

        if let Some(token) = lookup("SLACK_BOT_OAUTH_TOKEN") {
            self.slack.bot_token = Some(token);
        }

        if let Some(secret) = lookup("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = Some(secret);
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(%port, "Ignoring unparseable PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadkeeper")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.memory.min_score) {
            return Err(ConfigError::ValidationError(
                "memory.min_score must be between 0.0 and 1.0".into(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be > 0".into(),
            ));
        }

        if self.memory.keyword_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.keyword_top_k must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            slack: SlackConfig::default(),
            gateway: GatewayConfig::default(),
            assistant: AssistantConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
