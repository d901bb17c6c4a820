use std::sync::Arc;

use annotator_hub::HubClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: annotator_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Dataset hub client used by the export push endpoint.
    pub hub: Arc<HubClient>,
}

impl AppState {
    pub fn new(pool: annotator_db::DbPool, config: ServerConfig) -> Self {
        let hub = HubClient::new(config.hub_base_url.clone());
        Self {
            pool,
            config: Arc::new(config),
            hub: Arc::new(hub),
        }
    }
}
