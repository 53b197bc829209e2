use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion service.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Supabase project hosting object storage and the tracking table.
    pub supabase_url: String,
    /// Service-role key used for storage downloads and tracking upserts.
    pub supabase_service_key: String,
    /// Bucket holding uploaded files.
    pub storage_bucket: String,
    /// Name of the relational table tracking ingestion state.
    pub tracking_table: String,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Base URL of the embedding provider.
    pub embedding_url: String,
    /// Optional API key passed to the embedding provider.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Hard upper bound on chunk length in characters.
    pub chunk_max_chars: usize,
    /// Characters of the previous chunk duplicated at the start of the next.
    pub chunk_overlap_chars: usize,
    /// Minimum character count for direct PDF extraction to be accepted.
    pub pdf_quality_min_chars: usize,
    /// Minimum alphanumeric ratio for direct PDF extraction to be accepted.
    pub pdf_quality_min_alnum_ratio: f64,
    /// Rasterization resolution used for the OCR fallback.
    pub ocr_dpi: u32,
    /// Tesseract language code used for the OCR fallback.
    pub ocr_language: String,
    /// Timeout applied to every outbound collaborator call, in seconds.
    pub request_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
}

/// Default maximum upload size: 30 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 30 * 1024 * 1024;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            supabase_url: load_env("SUPABASE_URL")?,
            supabase_service_key: load_env("SUPABASE_SERVICE_KEY")?,
            storage_bucket: load_env_optional("STORAGE_BUCKET").unwrap_or_else(|| "files".into()),
            tracking_table: load_env_optional("TRACKING_TABLE")
                .unwrap_or_else(|| "ingestion_records".into()),
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_url: load_env("EMBEDDING_URL")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            chunk_max_chars: parse_optional("CHUNK_MAX_CHARS")?.unwrap_or(1024),
            chunk_overlap_chars: parse_optional("CHUNK_OVERLAP_CHARS")?.unwrap_or(200),
            pdf_quality_min_chars: parse_optional("PDF_QUALITY_MIN_CHARS")?.unwrap_or(100),
            pdf_quality_min_alnum_ratio: parse_optional("PDF_QUALITY_MIN_ALNUM_RATIO")?
                .unwrap_or(0.3),
            ocr_dpi: parse_optional("OCR_DPI")?.unwrap_or(300),
            ocr_language: load_env_optional("OCR_LANGUAGE").unwrap_or_else(|| "eng".into()),
            request_timeout_secs: parse_optional("REQUEST_TIMEOUT_SECS")?.unwrap_or(30),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Timeout applied to outbound collaborator calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// PostgREST base endpoint derived from the Supabase project URL.
    pub fn rest_base_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url.trim_end_matches('/'))
    }

    /// Storage base endpoint derived from the Supabase project URL.
    pub fn storage_base_url(&self) -> String {
        format!("{}/storage/v1", self.supabase_url.trim_end_matches('/'))
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        supabase_url = %config.supabase_url,
        bucket = %config.storage_bucket,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
