use std::sync::Arc;

use medval_core::results::ResultStore;

use crate::config::ServerConfig;
use crate::jobs::JobOrchestrator;
use crate::ws::ObserverHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Live observer connections.
    pub hub: Arc<ObserverHub>,
    /// Runs submitted jobs.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Read access to finished result files.
    pub results: ResultStore,
}

impl AppState {
    /// Wire up the hub, orchestrator and result store from configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        let hub = Arc::new(ObserverHub::new(config.heartbeat()));
        let orchestrator = Arc::new(JobOrchestrator::new(
            config.worker_command(),
            config.upload_dir.clone(),
            config.results_dir.clone(),
            Arc::clone(&hub),
        ));
        let results = ResultStore::new(config.results_dir.clone());

        Self {
            config: Arc::new(config),
            hub,
            orchestrator,
            results,
        }
    }
}
