use axum::{Json, extract::State, http::StatusCode, response::Response};
use tracing::info;

use personaforge_model::{OwnerKey, TalkRequest};

use super::{reply, videos::success};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Answer a message as a persona, always waiting for the video.
///
/// Same pipeline as make-video in sync mode, but the reply text always comes
/// from the text generator and the render budget is the shorter
/// `video.talk_timeout_ms`.
pub async fn talk_handler(
    State(state): State<AppState>,
    Json(request): Json<TalkRequest>,
) -> AppResult<Response> {
    let owner = OwnerKey::persona(request.persona_id)?;
    if request.message.trim().is_empty() {
        return Err(AppError::bad_request("message is required"));
    }
    let quality = reply::quality(&state, request.quality.as_deref())?;
    info!(owner = %owner, %quality, "talk requested");

    let text = reply::resolve_text(
        &state,
        None,
        Some(request.message),
        request.system_prompt,
    )
    .await?;

    let audio_url = match reply::speak(&state, &text, request.voice_id).await
    {
        Ok(audio_url) => audio_url,
        Err(text_only) => return Ok(success(StatusCode::OK, text_only)),
    };

    let response = reply::render_sync(
        &state,
        owner,
        text,
        audio_url,
        request.image,
        quality,
        state.config().video.talk_timeout(),
    )
    .await?;
    Ok(success(StatusCode::OK, response))
}
