pub mod v1;

use axum::{Router, routing::get};

use crate::{AppState, handlers::health};

/// Create the main API router with all versions
pub fn create_api_router() -> Router<AppState> {
    Router::new().nest("/api/v1", v1::create_v1_router())
}

/// Full application router with state applied; middleware layers are added
/// by the binary.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(health::ping_handler))
        .route("/health", get(health::health_handler))
        .merge(create_api_router())
        .with_state(state)
}
