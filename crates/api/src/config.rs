use std::path::PathBuf;
use std::str::FromStr;

use annotator_core::paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection string.
    pub database_url: String,
    /// Maximum accepted request body for uploads, in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,
    /// Directory that server-side import paths are resolved against.
    pub import_root: PathBuf,
    /// Base URL of the dataset hub (default: `https://huggingface.co`).
    pub hub_base_url: String,
    /// Default page size of the review list (default: `10`).
    pub page_size: i64,
}

/// A malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub expected: &'static str,
    pub value: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                               |
    /// |------------------------|---------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                             |
    /// | `PORT`                 | `3000`                                |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`               |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                  |
    /// | `DATABASE_URL`         | `postgres://localhost/annotator`      |
    /// | `MAX_UPLOAD_BYTES`     | `52428800`                            |
    /// | `IMPORT_ROOT`          | `.`                                   |
    /// | `HUB_BASE_URL`         | `https://huggingface.co`              |
    /// | `PAGE_SIZE`            | `10` (capped at 100)                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", "3000", "a valid u16")?;

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 =
            parse_env("REQUEST_TIMEOUT_SECS", "30", "a valid u64")?;
        let database_url = env_or("DATABASE_URL", "postgres://localhost/annotator");
        let max_upload_bytes: usize =
            parse_env("MAX_UPLOAD_BYTES", "52428800", "a byte count")?;
        let import_root = PathBuf::from(env_or("IMPORT_ROOT", "."));
        let hub_base_url = env_or("HUB_BASE_URL", "https://huggingface.co");

        let page_size: i64 = parse_env("PAGE_SIZE", "10", "a positive integer")?;
        if page_size < 1 {
            return Err(ConfigError {
                name: "PAGE_SIZE",
                expected: "a positive integer",
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            max_upload_bytes,
            import_root,
            hub_base_url,
            page_size: page_size.min(MAX_PAGE_SIZE),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            database_url: "postgres://localhost/annotator".into(),
            max_upload_bytes: 50 * 1024 * 1024,
            import_root: PathBuf::from("."),
            hub_base_url: "https://huggingface.co".into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(
    name: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let value = env_or(name, default);
    value.trim().parse().map_err(|_| ConfigError {
        name,
        expected,
        value,
    })
}
