pub mod config;
pub mod query;
pub mod report;
pub mod rest;
pub mod scraper;
pub mod storage;
pub mod tasks;

use std::sync::Arc;

use config::DaemonConfig;
use query::QueryService;
use storage::Storage;
use tasks::TaskManager;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Storage,
    pub tasks: Arc<TaskManager>,
    pub queries: Arc<QueryService>,
    pub started_at: std::time::Instant,
}
