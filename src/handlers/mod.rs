mod health;
mod home;
mod metrics;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub use health::health_handler;
pub use home::home_handler;
pub use metrics::metrics_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home_handler)) // the gated endpoint
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
