use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener and session settings
    pub server: ServerConfig,

    /// Storage paths
    pub storage: StorageConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Chat completion endpoints, tried in order
    pub chat: ChatConfig,

    /// Chunking and retrieval configuration
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub session_ttl_secs: u64,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub primary: ChatEndpoint,
    pub secondary: ChatEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEndpoint {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl StorageConfig {
    /// Lay out the database and snapshot under `data_dir`
    pub fn under(data_dir: PathBuf) -> Self {
        Self {
            db_path: data_dir.join("db"),
            snapshot_path: data_dir.join("index_snapshot.json"),
            data_dir,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                cors_origin: "http://localhost:3000".to_string(),
                session_ttl_secs: 24 * 60 * 60,
                max_upload_bytes: 32 * 1024 * 1024,
            },
            storage: StorageConfig::under(PathBuf::from("./data")),
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::OpenAI,
                api_key: None,
                model: "text-embedding-3-small".to_string(),
                base_url: None,
            },
            chat: ChatConfig {
                primary: ChatEndpoint {
                    api_base: GROQ_BASE_URL.to_string(),
                    api_key: String::new(),
                    model: "llama-3.1-8b-instant".to_string(),
                    temperature: 1.0,
                    max_tokens: 512,
                    timeout_secs: 60,
                },
                secondary: ChatEndpoint {
                    api_base: GROQ_BASE_URL.to_string(),
                    api_key: String::new(),
                    model: "llama3-8b-8192".to_string(),
                    temperature: 1.2,
                    max_tokens: 512,
                    timeout_secs: 60,
                },
            },
            search: SearchConfig {
                top_k: 5,
                chunk_size: 1000,
                chunk_overlap: 200,
                batch_size: 32,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var("PORT")? {
            config.server.port = port;
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            config.server.cors_origin = origin;
        }
        if let Some(ttl) = parse_var("SESSION_TTL_SECS")? {
            config.server.session_ttl_secs = ttl;
        }
        if let Some(megabytes) = parse_var::<usize>("MAX_UPLOAD_MB")? {
            config.server.max_upload_bytes = megabytes * 1024 * 1024;
        }

        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            config.storage = StorageConfig::under(PathBuf::from(data_dir));
        }

        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = match provider.to_lowercase().as_str() {
                "ollama" => {
                    config.embedding.model = "all-minilm".to_string();
                    EmbeddingProvider::Ollama
                }
                _ => EmbeddingProvider::OpenAI,
            };
        }
        if let Ok(api_key) =
            std::env::var("EMBEDDING_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            config.embedding.api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(base_url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = Some(base_url);
        }

        load_chat_endpoint(&mut config.chat.primary, "PRIMARY")?;
        load_chat_endpoint(&mut config.chat.secondary, "SECONDARY")?;

        if let Some(top_k) = parse_var("SEARCH_TOP_K")? {
            config.search.top_k = top_k;
        }
        if let Some(size) = parse_var("CHUNK_SIZE")? {
            config.search.chunk_size = size;
        }
        if let Some(overlap) = parse_var("CHUNK_OVERLAP")? {
            config.search.chunk_overlap = overlap;
        }
        if let Some(batch) = parse_var("EMBED_BATCH_SIZE")? {
            config.search.batch_size = batch;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chat.primary.api_key.trim().is_empty() {
            return Err(Error::Config(
                "PRIMARY_API_KEY environment variable is not set.".to_string(),
            ));
        }
        if self.search.chunk_size == 0 {
            return Err(Error::Config("CHUNK_SIZE must be positive".to_string()));
        }
        if self.search.chunk_overlap >= self.search.chunk_size {
            return Err(Error::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.search.chunk_overlap, self.search.chunk_size
            )));
        }
        Ok(())
    }
}

fn load_chat_endpoint(endpoint: &mut ChatEndpoint, prefix: &str) -> Result<()> {
    if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
        endpoint.api_key = key;
    }
    if let Ok(base) = std::env::var(format!("{prefix}_API_BASE")) {
        if !base.trim().is_empty() {
            endpoint.api_base = base;
        }
    }
    if let Ok(model) = std::env::var(format!("{prefix}_MODEL")) {
        if !model.trim().is_empty() {
            endpoint.model = model;
        }
    }
    if let Some(temperature) = parse_var(&format!("{prefix}_TEMPERATURE"))? {
        endpoint.temperature = temperature;
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {key} value '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
