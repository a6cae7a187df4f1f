use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::orchestrator::Orchestrator;

pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
}
