use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::DatabaseProxy;
use crate::response::AppError;
use crate::services::generator::TaskGenerator;
use crate::services::llm_provider::TextGenerator;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    db_proxy: Option<Arc<DatabaseProxy>>,
    llm: Arc<dyn TextGenerator>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db_proxy: Option<Arc<DatabaseProxy>>,
        llm: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config,
            db_proxy,
            llm,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    /// The pool, or 503 when the server runs without a database.
    pub fn require_db(&self) -> Result<Arc<DatabaseProxy>, AppError> {
        self.db_proxy
            .clone()
            .ok_or_else(|| AppError::service_unavailable("Database is unavailable"))
    }

    pub fn generator(&self) -> TaskGenerator {
        TaskGenerator::new(Arc::clone(&self.llm))
    }
}
