pub mod health;
pub mod logs_api;
pub mod metrics_handler;
pub mod request_context;

use crate::config::Config;
use crate::pipeline::BatchLogger;
use crate::storage::SqliteLogStore;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteLogStore>,
    pub logger: BatchLogger,
    pub config: Arc<ArcSwap<Config>>,
}
