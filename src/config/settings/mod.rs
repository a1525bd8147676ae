#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    Ollama,
    /// OpenAI-compatible `/embeddings` endpoint
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub remote_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            batch_size: 100,
            remote_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub site_url: String,
    pub site_name: String,
    pub timeout_secs: u64,
    pub cost_per_1k_tokens: f64,
    pub auto_accept_cost: bool,
    pub question_temperature: f32,
    pub generator_temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            site_url: "http://localhost".to_string(),
            site_name: "lore-whisper".to_string(),
            timeout_secs: 30,
            cost_per_1k_tokens: 0.03,
            auto_accept_cost: false,
            question_temperature: 1.0,
            generator_temperature: 0.9,
            max_tokens: None,
        }
    }
}

/// What the context budget is measured against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    /// Only the packed snippets count toward the budget.
    #[default]
    Context,
    /// The rendered prompt (template prefix + context + suffix) counts toward the budget.
    Prompt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub context_budget: usize,
    pub budget_scope: BudgetScope,
    pub relevance_threshold: f32,
    pub top_relevant_cap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 12,
            context_budget: 4000,
            budget_scope: BudgetScope::Context,
            relevance_threshold: 0.7,
            top_relevant_cap: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Lancedb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub table: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Lancedb,
            table: "lore".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid context budget: {0} (must be greater than 0)")]
    InvalidContextBudget(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 1000)")]
    InvalidTopK(usize),
    #[error("Invalid relevance threshold: {0} (must be between -1.0 and 1.0)")]
    InvalidRelevanceThreshold(f32),
    #[error("Invalid cost rate: {0} (must be zero or positive)")]
    InvalidCostRate(f64),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid table name: {0} (cannot be empty)")]
    InvalidTable(String),
    #[error("Environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for crate::LoreError {
    #[inline]
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl Config {
    /// Default base directory, `~/.lore-whisper`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".lore-whisper"))
            .or_else(|| dirs::data_dir().map(|data| data.join("lore-whisper")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.retrieval.validate()?;
        if self.index.table.trim().is_empty() {
            return Err(ConfigError::InvalidTable(self.index.table.clone()));
        }
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

fn validate_timeout(timeout_secs: u64) -> Result<(), ConfigError> {
    if !(1..=300).contains(&timeout_secs) {
        return Err(ConfigError::InvalidTimeout(timeout_secs));
    }
    Ok(())
}

fn validate_temperature(temperature: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::InvalidTemperature(temperature));
    }
    Ok(())
}

/// Reads an API key from the named environment variable
#[inline]
pub fn api_key_from_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingApiKey(var.to_string()))
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            EmbeddingBackend::Ollama => {
                if self.protocol != "http" && self.protocol != "https" {
                    return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
                }
                if self.port == 0 {
                    return Err(ConfigError::InvalidPort(self.port));
                }
                self.ollama_url()?;
            }
            EmbeddingBackend::Remote => {
                Url::parse(&self.remote_url)
                    .map_err(|_| ConfigError::InvalidUrl(self.remote_url.clone()))?;
            }
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        validate_timeout(self.timeout_secs)
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !self.cost_per_1k_tokens.is_finite() || self.cost_per_1k_tokens < 0.0 {
            return Err(ConfigError::InvalidCostRate(self.cost_per_1k_tokens));
        }

        validate_temperature(self.question_temperature)?;
        validate_temperature(self.generator_temperature)?;
        validate_timeout(self.timeout_secs)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_budget == 0 {
            return Err(ConfigError::InvalidContextBudget(self.context_budget));
        }

        if !(1..=1000).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !(-1.0..=1.0).contains(&self.relevance_threshold) {
            return Err(ConfigError::InvalidRelevanceThreshold(
                self.relevance_threshold,
            ));
        }

        Ok(())
    }

    pub fn set_context_budget(&mut self, budget: usize) -> Result<(), ConfigError> {
        if budget == 0 {
            return Err(ConfigError::InvalidContextBudget(budget));
        }
        self.context_budget = budget;
        Ok(())
    }

    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&top_k) {
            return Err(ConfigError::InvalidTopK(top_k));
        }
        self.top_k = top_k;
        Ok(())
    }
}
