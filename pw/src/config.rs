//! Planwizard configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::LlmError;

/// Main planwizard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation provider configuration
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Retrieval parameters
    pub retrieval: RetrievalConfig,

    /// Corpus indexing parameters
    pub indexing: IndexingConfig,

    /// Storage locations
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required API-key environment variables are set. Call
    /// this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if std::env::var(&self.embedding.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Embedding API key not found. Set the {} environment variable.",
                self.embedding.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planwizard.yml
        let local_config = PathBuf::from(".planwizard.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planwizard/planwizard.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planwizard").join("planwizard.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        std::env::var(&self.api_key_env).map_err(|_| LlmError::MissingCredentials(self.api_key_env.clone()))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Embedding model identifier; doubles as the stored version tag
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Embedding dimension
    pub dim: usize,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl EmbeddingConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        std::env::var(&self.api_key_env).map_err(|_| LlmError::MissingCredentials(self.api_key_env.clone()))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            dim: 1536,
            timeout_ms: 60_000,
        }
    }
}

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum documents returned per query
    #[serde(rename = "top-k")]
    pub top_k: usize,

    /// Minimum cosine similarity; hits below it are dropped entirely
    /// rather than padding results with low-relevance noise
    #[serde(rename = "min-score")]
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            min_score: 0.25,
        }
    }
}

/// Corpus indexing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Texts per embedding request
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Fixed pacing delay between batches (provider rate limits)
    #[serde(rename = "pacing-ms")]
    pub pacing_ms: u64,

    /// Texts longer than this are truncated before embedding
    #[serde(rename = "max-input-chars")]
    pub max_input_chars: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            pacing_ms: 200,
            max_input_chars: 8000,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the corpus store database
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,

    /// Directory for persisted profiles, conversations and plans
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: base.join("corpusstore").join("corpus.db"),
            data_dir: base.join("planwizard"),
        }
    }
}
