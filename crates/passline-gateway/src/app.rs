use axum::{routing::get, Router};
use passline_core::config::{PasslineConfig, REALTIME_PATH};
use std::sync::Arc;

use crate::orders::OrderDirectory;
use crate::ws::broadcast::EventBroadcaster;
use crate::ws::registry::ConnectionRegistry;

/// Central shared state — constructed once in `main` and passed as
/// `Arc<AppState>` to all Axum handlers. No hidden globals.
pub struct AppState {
    pub config: PasslineConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: EventBroadcaster,
    pub orders: Arc<dyn OrderDirectory>,
}

impl AppState {
    pub fn new(config: PasslineConfig, orders: Arc<dyn OrderDirectory>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config,
            broadcaster: EventBroadcaster::new(registry.clone()),
            registry,
            orders,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(REALTIME_PATH, get(crate::ws::connection::realtime_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
