//! Process configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use medstock_observability::{LogFormat, UnknownLogFormat};

pub const BIND_ADDR_VAR: &str = "MEDSTOCK_BIND_ADDR";
pub const LOG_FORMAT_VAR: &str = "MEDSTOCK_LOG_FORMAT";
pub const CATALOG_FILE_VAR: &str = "MEDSTOCK_CATALOG_FILE";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a socket address: {source}")]
    InvalidBindAddr {
        var: &'static str,
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("MEDSTOCK_LOG_FORMAT: {0}")]
    InvalidLogFormat(#[from] UnknownLogFormat),

    #[error("catalog file {path:?}: {reason}")]
    CatalogFile { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    /// JSON catalog snapshot loaded into the in-memory catalog at startup.
    pub catalog_file: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or blank values take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let raw_addr = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                var: BIND_ADDR_VAR,
                value: raw_addr.clone(),
                source,
            })?;

        let log_format = match get(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            log_format,
            catalog_file: get(CATALOG_FILE_VAR).map(PathBuf::from),
        })
    }

    /// Logged once tracing is up (config is read before the subscriber exists).
    pub fn log_summary(&self) {
        info!(
            bind_addr = %self.bind_addr,
            log_format = ?self.log_format,
            catalog_file = ?self.catalog_file,
            "configuration loaded"
        );
    }
}
