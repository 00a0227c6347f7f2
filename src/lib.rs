pub mod config;
pub mod errors;
pub mod executor;
pub mod memory;
pub mod query;
pub mod types;
pub mod utils;

use crate::config::QueryConfig;
use crate::errors::DbError;
use crate::executor::Executor;
use crate::memory::MemoryStore;
use crate::query::Builder;
use std::path::Path;
use std::sync::Arc;

pub use crate::errors::ExecutionError;
pub use crate::executor::{Command, Reply};
pub use crate::query::{Operator, Order, Record};

/// Entry point: a store executor plus settings, handing out query builders.
#[derive(Clone)]
pub struct Connection {
    executor: Arc<dyn Executor>,
    config: Arc<QueryConfig>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps an executor with default settings.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self::with_config(executor, QueryConfig::default())
    }

    pub fn with_config(executor: Arc<dyn Executor>, config: QueryConfig) -> Self {
        Self { executor, config: Arc::new(config) }
    }

    /// Connection backed by a fresh in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// A new, unfiltered builder on `name`.
    #[must_use]
    pub fn collection(&self, name: &str) -> Builder {
        Builder::new(self.executor.clone(), self.config.clone(), name)
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }
}

/// Loads settings (see [`QueryConfig::load`]) and installs logging.
///
/// This should be called once before the first query when file logging is
/// wanted; the library itself only uses the `log` facade.
///
/// # Errors
/// Returns `Config` or `Io` when settings cannot be loaded or the log files
/// cannot be created.
pub fn init(config_path: Option<&Path>) -> Result<QueryConfig, DbError> {
    let config = QueryConfig::load(config_path)?;
    config.init_logging()?;
    log::info!("nexusquery initialized (slow query threshold {} ms)", config.slow_query_ms);
    Ok(config)
}
