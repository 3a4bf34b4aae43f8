use std::{env, fs};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use log::{info, warn};
use url::Url;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

pub const MODEL_NAME: &str = "llama3.2";
pub const EMBEDDING_MODEL: &str = "all-minilm";
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about a GitHub repository. \
Use the provided context from the repository to answer. If the context does not contain the answer, say so.";
const OLLAMA_PORT: u16 = 11435;
const OLLAMA_HOST: &'static str = "http://localhost";
const MEILISEARCH_URL: &'static str = "http://localhost:7700";
const GITHUB_API_URL: &'static str = "https://api.github.com";

const CONFIG_PATH_VAR: &str = "REPO_CHAT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";
const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
const MEILISEARCH_KEY_VAR: &str = "MEILISEARCH_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Missing required secret {0}")]
    MissingSecret(&'static str),

    #[error("Invalid URL for {field}: {value:?} ({reason})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: i32,
    /// Ask the model for a fragment stream instead of a single reply.
    pub stream: bool,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: MODEL_NAME.to_string(),
            temperature: 0.5,
            max_tokens: 1000,
            stream: false,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// `memory` or `meilisearch`.
    pub provider: String,
    /// Snapshot directory for the memory store. No snapshot when unset.
    pub dir: Option<PathBuf>,
    pub url: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            dir: None,
            url: MEILISEARCH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub provider: String,
    pub model: String,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.to_string(),
            port: OLLAMA_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub max_files: usize,
    pub max_file_size: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_URL.to_string(),
            max_files: 500,
            max_file_size: 200_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub footer_path: PathBuf,
    /// Sessions untouched for this long are dropped along with their knowledge base.
    pub session_idle_minutes: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: PathBuf::from("./static"),
            footer_path: PathBuf::from("static/footer.html"),
            session_idle_minutes: 60,
        }
    }
}

/// Secrets never come from the config file, only from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub github_token: String,
    pub meilisearch_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub vectordb: VectorDbConfig,
    pub embedder: EmbedderConfig,
    pub ollama: OllamaConfig,
    pub chunker: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub github: GithubConfig,
    pub server: ServerConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl AppConfig {
    /// Parses a config file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn ollama_url(&self) -> String {
        format!("{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Rejects service URLs the HTTP clients cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("ollama.host", &self.ollama.host)?;
        check_url("github.api_url", &self.github.api_url)?;
        if self.vectordb.provider == "meilisearch" {
            check_url("vectordb.url", &self.vectordb.url)?;
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.server.session_idle_minutes))
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

/// Loads `.env`, the optional JSON config file and the secrets.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    if let Err(e) = dotenv::dotenv() {
        info!("No .env file loaded: {}", e);
    }

    let path = PathBuf::from(env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()));
    let mut config = if path.exists() {
        info!("Reading configuration from {}", path.display());
        AppConfig::from_file(&path)?
    } else {
        warn!("Config file {} not found, using defaults", path.display());
        AppConfig::default()
    };
    config.validate()?;

    config.secrets = read_secrets()?;
    Ok(config)
}

fn read_secrets() -> Result<Secrets, ConfigError> {
    let github_token = env::var(GITHUB_TOKEN_VAR)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingSecret(GITHUB_TOKEN_VAR))?;
    let meilisearch_key = env::var(MEILISEARCH_KEY_VAR).ok().filter(|k| !k.is_empty());

    Ok(Secrets {
        github_token,
        meilisearch_key,
    })
}
