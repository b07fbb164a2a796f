use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use personaforge_core::VideoError;
use personaforge_model::{
    ApiResponse, MakeVideoRequest, OwnerKey, ResponseMode, VideoAccepted,
    VideoJobInput, VideoResponse,
};

use super::reply::{self, NO_IMAGE_NOTE, non_blank};
use crate::infra::{app_state::AppState, errors::AppResult};

/// Make a talking-head video for a persona
///
/// Voices `text` (or the text generator's answer to `message`) and lip-syncs
/// it onto `image`.
///
/// # Request
///
/// ```json
/// {
///   "persona_id": "persona-1",
///   "text": "Hello there!",
///   "image": "https://cdn.example.com/ada.png",
///   "quality": "standard",
///   "mode": "sync"
/// }
/// ```
///
/// # Response
///
/// - `200 OK` with a [`VideoResponse`] in sync mode. `video_url` is `null`
///   with a `note` when speech, the image or every provider was missing.
/// - `202 Accepted` with a [`VideoAccepted`] ticket in async mode
/// - `400 Bad Request` when neither text nor message is given
pub async fn make_video_handler(
    State(state): State<AppState>,
    Json(request): Json<MakeVideoRequest>,
) -> AppResult<Response> {
    let owner = OwnerKey::persona(request.persona_id)?;
    let quality = reply::quality(&state, request.quality.as_deref())?;
    info!(
        owner = %owner,
        mode = ?request.mode,
        %quality,
        "make-video requested"
    );

    let text = reply::resolve_text(
        &state,
        request.text,
        request.message,
        request.system_prompt,
    )
    .await?;

    let audio_url = match reply::speak(&state, &text, request.voice_id).await
    {
        Ok(audio_url) => audio_url,
        Err(text_only) => return Ok(success(StatusCode::OK, text_only)),
    };

    match request.mode {
        ResponseMode::Sync => {
            let response = reply::render_sync(
                &state,
                owner,
                text,
                audio_url,
                request.image,
                quality,
                state.config().video.sync_timeout(),
            )
            .await?;
            Ok(success(StatusCode::OK, response))
        }
        ResponseMode::Async => {
            let Some(image) = non_blank(request.image) else {
                return Ok(success(
                    StatusCode::OK,
                    VideoResponse {
                        text: Some(text),
                        audio_url: Some(audio_url),
                        note: Some(NO_IMAGE_NOTE.to_string()),
                        ..Default::default()
                    },
                ));
            };

            let input =
                VideoJobInput::lipsync(image, audio_url.clone(), quality);
            match state.videos.submit_video_job(owner, input).await {
                Ok(ticket) => {
                    let status = if ticket.status.is_terminal() {
                        StatusCode::OK
                    } else {
                        StatusCode::ACCEPTED
                    };
                    Ok(success(
                        status,
                        VideoAccepted {
                            text: Some(text),
                            audio_url: Some(audio_url),
                            ticket,
                        },
                    ))
                }
                Err(VideoError::Configuration(note)) => {
                    warn!(
                        note = %note,
                        "async render unavailable, returning audio only"
                    );
                    Ok(success(
                        StatusCode::OK,
                        VideoResponse {
                            text: Some(text),
                            audio_url: Some(audio_url),
                            note: Some(note),
                            ..Default::default()
                        },
                    ))
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

pub(crate) fn success<T: serde::Serialize>(
    status: StatusCode,
    data: T,
) -> Response {
    (status, Json(ApiResponse::success(data))).into_response()
}
