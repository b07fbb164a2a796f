use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "PersonaForge is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Reports which upstreams are usable. Without any video provider the
/// service still answers, with audio-only results, so it reports
/// `degraded` rather than failing the check.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let providers = state.videos.coordinator().configured_kinds();
    let status = if providers.is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    Json(json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "video_providers": providers,
            "speech": state.speech.is_configured(),
            "text": state.text.is_configured(),
            "active_jobs": state.videos.active_jobs().len(),
        }
    }))
}
