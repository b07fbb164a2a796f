use axum::{Json, extract::State, http::StatusCode, response::Response};
use tracing::info;

use personaforge_model::{
    IdleVideoRequest, OwnerKey, VideoJobInput, VideoResponse,
};

use super::{
    reply::{self, non_blank},
    videos::success,
};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Return the persona's idle animation, rendering one if needed.
///
/// A previously completed idle video is served from the cache unless
/// `refresh` is set. Otherwise an idle job is submitted and its ticket
/// returned with `202 Accepted`.
pub async fn idle_video_handler(
    State(state): State<AppState>,
    Json(request): Json<IdleVideoRequest>,
) -> AppResult<Response> {
    // Own key so an idle render and a talking render can run side by side.
    let persona = OwnerKey::persona(request.persona_id)?;
    let owner = persona.scoped("idle");

    if !request.refresh
        && let Some(cached) = state.videos.cached_result(&owner)
    {
        info!(
            owner = %owner,
            job_id = %cached.job_id,
            "serving cached idle video"
        );
        return Ok(success(
            StatusCode::OK,
            VideoResponse {
                video_url: cached.video_url,
                job_id: Some(cached.job_id),
                status: Some(cached.status),
                provider: cached.provider,
                cached: true,
                ..Default::default()
            },
        ));
    }

    let Some(image) = non_blank(request.image) else {
        return Err(AppError::bad_request(
            "image is required to render an idle video",
        ));
    };
    let quality = reply::quality(&state, request.quality.as_deref())?;
    info!(
        owner = %owner,
        %quality,
        refresh = request.refresh,
        "idle video requested"
    );

    let ticket = state
        .videos
        .submit_video_job(
            owner,
            VideoJobInput::idle(persona.as_str(), image, quality),
        )
        .await?;
    let status = if ticket.status.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok(success(status, ticket))
}
