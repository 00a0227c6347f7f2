//! Runtime settings.
//!
//! Loaded from TOML with this precedence: an explicit path, then
//! `NEXUSQUERY_CONFIG`, then `./nexusquery.toml`, then defaults. Environment
//! variables are applied last and override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::DbError;
use crate::utils::logger;

pub const CONFIG_ENV: &str = "NEXUSQUERY_CONFIG";
pub const DEFAULT_FILE: &str = "nexusquery.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Round trips at or above this many milliseconds are logged to the slow
    /// log. Zero disables the check.
    pub slow_query_ms: u64,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub log_retention: usize,
    pub dev_log: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            slow_query_ms: 500,
            log_dir: None,
            log_level: "info".to_string(),
            log_retention: 7,
            dev_log: false,
        }
    }
}

impl QueryConfig {
    /// Parses TOML text; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns `Config` for malformed TOML or wrongly typed keys.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        toml::from_str(s).map_err(|e| DbError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns `Io` when the file cannot be read, `Config` when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path).map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Resolves the configuration file and applies environment overrides.
    ///
    /// An explicit path or `NEXUSQUERY_CONFIG` must exist; `./nexusquery.toml`
    /// is optional.
    ///
    /// # Errors
    /// See [`QueryConfig::from_file`]; also `Config` for unparsable overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DbError> {
        let mut cfg = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Ok(path) = std::env::var(CONFIG_ENV) {
            Self::from_file(Path::new(&path))?
        } else {
            let local = std::env::current_dir().map(|d| d.join(DEFAULT_FILE)).unwrap_or_else(|_| PathBuf::from(DEFAULT_FILE));
            if local.is_file() { Self::from_file(&local)? } else { Self::default() }
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Applies `NEXUSQUERY_*` overrides read through `var`.
    ///
    /// # Errors
    /// Returns `Config` when a numeric override does not parse.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("NEXUSQUERY_SLOW_QUERY_MS") {
            self.slow_query_ms = v
                .trim()
                .parse()
                .map_err(|e| DbError::Config(format!("NEXUSQUERY_SLOW_QUERY_MS='{v}': {e}")))?;
        }
        if let Some(v) = var("NEXUSQUERY_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("NEXUSQUERY_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("NEXUSQUERY_LOG_RETENTION") {
            self.log_retention = v
                .trim()
                .parse()
                .map_err(|e| DbError::Config(format!("NEXUSQUERY_LOG_RETENTION='{v}': {e}")))?;
        }
        if let Some(v) = var("NEXUSQUERY_DEV6") {
            self.dev_log = logger::is_truthy(&v);
        }
        Ok(())
    }

    /// Installs the log4rs configuration described by the log settings.
    ///
    /// # Errors
    /// See [`logger::configure_logging`].
    pub fn init_logging(&self) -> Result<(), DbError> {
        logger::configure_logging(
            self.log_dir.as_deref(),
            Some(&self.log_level),
            Some(self.log_retention),
            self.dev_log,
        )
    }
}
