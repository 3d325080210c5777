use std::sync::Arc;

use crate::config::Config;
use crate::history::HistoryStore;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub history: Arc<HistoryStore>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, history: HistoryStore) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(JobRegistry::new()),
            history: Arc::new(history),
            metrics: Arc::new(Metrics::new()),
        }
    }
}
