use axum::{
    Json,
    extract::{Path, State},
};

use personaforge_model::{ApiResponse, JobId, JobStatusView};

use crate::infra::{app_state::AppState, errors::AppResult};

/// Status of a video job
///
/// Terminal jobs are answered from the result cache. A job that timed out
/// locally is re-checked with its provider, so a render that finished late
/// still shows up as completed.
///
/// # Response
///
/// - `200 OK` with a [`JobStatusView`]
/// - `400 Bad Request` for a malformed id
/// - `404 Not Found` for an unknown id
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<ApiResponse<JobStatusView>>> {
    let job_id: JobId = job_id.parse()?;
    let view = state.videos.get_job_status(job_id).await?;
    Ok(Json(ApiResponse::success(view)))
}
