use std::fmt;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CollaboratorError, ensure_success};
use crate::providers::non_empty;

const SERVICE: &str = "elevenlabs";

pub const DEFAULT_ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_multilingual_v2";

/// Voice tuning passed through to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Encoded audio returned by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SynthesizedAudio {
    /// Inline `data:` URI, the form video workers accept as `driven_audio`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_configured(&self) -> bool;

    /// `voice_id` falls back to the configured default voice when `None`.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<String>,
    ) -> Result<SynthesizedAudio, CollaboratorError>;
}

pub struct ElevenLabsSpeech {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_voice: Option<String>,
    model_id: String,
    settings: VoiceSettings,
}

impl fmt::Debug for ElevenLabsSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsSpeech")
            .field("base_url", &self.base_url)
            .field("default_voice", &self.default_voice)
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSpeech {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        api_key: Option<String>,
        default_voice: Option<String>,
        model_id: Option<String>,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            http,
            base_url: non_empty(base_url)
                .unwrap_or_else(|| DEFAULT_ELEVENLABS_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_empty(api_key),
            default_voice: non_empty(default_voice),
            model_id: non_empty(model_id)
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            settings,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.default_voice.is_some()
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<String>,
    ) -> Result<SynthesizedAudio, CollaboratorError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CollaboratorError::NotConfigured { service: SERVICE });
        };
        let Some(voice) =
            non_empty(voice_id).or_else(|| self.default_voice.clone())
        else {
            return Err(CollaboratorError::NotConfigured { service: SERVICE });
        };

        let response = self
            .http
            .post(format!("{}/text-to-speech/{voice}", self.base_url))
            .header("xi-api-key", api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
                voice_settings: self.settings,
            })
            .send()
            .await
            .map_err(|source| CollaboratorError::Network {
                service: SERVICE,
                source,
            })?;

        let response = match ensure_success(SERVICE, response).await {
            Ok(response) => response,
            Err(err) => {
                warn!(voice = %voice, error = %err, "speech synthesis failed");
                return Err(err);
            }
        };

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("audio/"))
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response.bytes().await.map_err(|source| {
            CollaboratorError::Network {
                service: SERVICE,
                source,
            }
        })?;

        if bytes.is_empty() {
            return Err(CollaboratorError::Empty { service: SERVICE });
        }
        debug!(voice = %voice, bytes = bytes.len(), "speech synthesized");

        Ok(SynthesizedAudio {
            mime,
            bytes: bytes.to_vec(),
        })
    }
}
