use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{idle, jobs, talk, videos},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/videos", post(videos::make_video_handler))
        .route("/talk", post(talk::talk_handler))
        .route("/idle-video", post(idle::idle_video_handler))
        .route("/jobs/{job_id}", get(jobs::job_status_handler))
}
