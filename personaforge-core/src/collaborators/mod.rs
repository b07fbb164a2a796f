//! Upstream services the video pipeline consumes but does not orchestrate:
//! text generation for replies and speech synthesis for the audio track.

pub mod speech;
pub mod text;

pub use speech::{
    ElevenLabsSpeech, SpeechSynthesizer, SynthesizedAudio, VoiceSettings,
};
pub use text::{AnthropicText, TextGenerator, TextRequest};

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned malformed JSON: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an empty response")]
    Empty { service: &'static str },
}

/// Fails with [`CollaboratorError::Http`] on a non-2xx response, keeping the
/// raw body.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Http {
        service,
        status: status.as_u16(),
        body,
    })
}
