//! Steps shared by the routes that turn a persona reply into a video: pick
//! the text, voice it, render it.

use std::time::Duration;

use tracing::warn;

use personaforge_core::{VideoOutcome, collaborators::TextRequest};
use personaforge_model::{
    OwnerKey, QualityTier, VideoJobInput, VideoResponse,
};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

pub(crate) const NO_IMAGE_NOTE: &str = "no image provided; audio only";

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

pub(crate) fn quality(
    state: &AppState,
    raw: Option<&str>,
) -> AppResult<QualityTier> {
    match raw.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(state.config().video.default_quality),
    }
}

/// Uses `text` verbatim when present, otherwise asks the text generator to
/// answer `message`.
pub(crate) async fn resolve_text(
    state: &AppState,
    text: Option<String>,
    message: Option<String>,
    system_prompt: Option<String>,
) -> AppResult<String> {
    if let Some(text) = non_blank(text) {
        return Ok(text);
    }
    let Some(message) = non_blank(message) else {
        return Err(AppError::bad_request(
            "either text or message is required",
        ));
    };

    let request =
        TextRequest::new(message).with_system_prompt(non_blank(system_prompt));
    state.text.generate(request).await.map_err(|err| {
        warn!(error = %err, "text generation failed");
        AppError::from(err)
    })
}

/// Synthesizes `text` into a `data:` URI. On failure the text-only response
/// to return instead is handed back as the error.
pub(crate) async fn speak(
    state: &AppState,
    text: &str,
    voice_id: Option<String>,
) -> Result<String, VideoResponse> {
    match state.speech.synthesize(text, non_blank(voice_id)).await {
        Ok(audio) => Ok(audio.to_data_uri()),
        Err(err) => {
            warn!(error = %err, "speech synthesis failed, returning text only");
            Err(VideoResponse {
                text: Some(text.to_string()),
                note: Some(format!("speech synthesis failed: {err}")),
                ..Default::default()
            })
        }
    }
}

/// Waits for a lip-sync render of `audio_url` over `image`. A missing image
/// short-circuits to an audio-only response.
pub(crate) async fn render_sync(
    state: &AppState,
    owner: OwnerKey,
    text: String,
    audio_url: String,
    image: Option<String>,
    quality: QualityTier,
    budget: Duration,
) -> AppResult<VideoResponse> {
    let Some(image) = non_blank(image) else {
        return Ok(VideoResponse {
            text: Some(text),
            audio_url: Some(audio_url),
            note: Some(NO_IMAGE_NOTE.to_string()),
            ..Default::default()
        });
    };

    let input = VideoJobInput::lipsync(image, audio_url.clone(), quality);
    let outcome = state
        .videos
        .generate_video_sync(owner, input, budget)
        .await?;

    Ok(video_response(text, audio_url, outcome))
}

pub(crate) fn video_response(
    text: String,
    audio_url: String,
    outcome: VideoOutcome,
) -> VideoResponse {
    VideoResponse {
        text: Some(text),
        audio_url: Some(audio_url),
        video_url: outcome.video_url,
        job_id: Some(outcome.job_id),
        status: Some(outcome.status),
        provider: outcome.provider,
        note: outcome.note,
        cached: false,
    }
}
