use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_STREAM: &str = "documents";
const DEFAULT_CONSUMER_GROUP: &str = "document_processors";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_MISTRAL_MODEL: &str = "mistral-tiny";
const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 5;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the API server and the worker.
///
/// The configuration is a plain value: binaries load it once at startup and hand the relevant
/// pieces to the clients they construct.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL backing both the job store and the work queue.
    pub redis_url: String,
    /// Stream (topic) that receives queued jobs.
    pub document_stream: String,
    /// Consumer group shared by all workers.
    pub consumer_group: String,
    /// Remote model settings used by the extraction strategies and summarization.
    pub providers: ProviderConfig,
    /// HTTP server port for the upload/status API.
    pub server_port: u16,
    /// Route prefix for the versioned API.
    pub api_prefix: String,
    /// Worker loop tuning.
    pub worker: WorkerConfig,
}

/// Credentials and endpoints for the remote generative providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Gemini API key; enhanced extraction and summarization require it.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Gemini model identifier.
    pub gemini_model: String,
    /// Mistral API key; OCR enhancement returns a placeholder without it.
    pub mistral_api_key: Option<String>,
    /// Base URL of the Mistral REST API.
    pub mistral_base_url: String,
    /// Mistral chat model identifier.
    pub mistral_model: String,
}

/// Settings for a single worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer identity inside the group.
    pub consumer_name: String,
    /// Upper bound for one blocking read.
    pub block_timeout: Duration,
    /// Sleep applied after a failed read before retrying.
    pub retry_backoff: Duration,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            redis_url: redis_url_from_env()?,
            document_stream: load_env_or("DOCUMENT_STREAM", DEFAULT_STREAM),
            consumer_group: load_env_or("DOCUMENT_CONSUMER_GROUP", DEFAULT_CONSUMER_GROUP),
            providers: ProviderConfig {
                gemini_api_key: load_env_optional("GEMINI_API_KEY"),
                gemini_base_url: load_env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                gemini_model: load_env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                mistral_api_key: load_env_optional("MISTRAL_API_KEY"),
                mistral_base_url: load_env_or("MISTRAL_BASE_URL", DEFAULT_MISTRAL_BASE_URL),
                mistral_model: load_env_or("MISTRAL_MODEL", DEFAULT_MISTRAL_MODEL),
            },
            server_port: parse_env("SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
            api_prefix: normalize_prefix(&load_env_or("API_PREFIX", DEFAULT_API_PREFIX)),
            worker: WorkerConfig {
                consumer_name: load_env_optional("WORKER_CONSUMER_NAME")
                    .unwrap_or_else(default_consumer_name),
                block_timeout: Duration::from_millis(
                    parse_env("WORKER_BLOCK_TIMEOUT_MS")?.unwrap_or(DEFAULT_BLOCK_TIMEOUT_MS),
                ),
                retry_backoff: Duration::from_secs(
                    parse_env("WORKER_RETRY_BACKOFF_SECS")?.unwrap_or(DEFAULT_RETRY_BACKOFF_SECS),
                ),
            },
        })
    }
}

/// Consumer name used when none is configured: unique per process on one host.
pub fn default_consumer_name() -> String {
    format!("worker-{}", std::process::id())
}

fn redis_url_from_env() -> Result<String, ConfigError> {
    if let Some(url) = load_env_optional("REDIS_URL") {
        return Ok(url);
    }
    let host = load_env_or("REDIS_HOST", DEFAULT_REDIS_HOST);
    let port: u16 = parse_env("REDIS_PORT")?.unwrap_or(DEFAULT_REDIS_PORT);
    Ok(format!("redis://{host}:{port}"))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Read `.env` (when present) and load configuration from the environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        redis_url = %crate::connection::redact_credentials(&config.redis_url),
        stream = %config.document_stream,
        group = %config.consumer_group,
        server_port = config.server_port,
        gemini_configured = config.providers.gemini_api_key.is_some(),
        mistral_configured = config.providers.mistral_api_key.is_some(),
        "Loaded configuration"
    );
    Ok(config)
}
