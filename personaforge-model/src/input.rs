use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Render quality requested from the GPU worker.
///
/// Higher tiers enable face enhancement, upscaling and grading on the
/// worker side and take correspondingly longer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Realtime,
    Draft,
    #[default]
    Standard,
    High,
    Pixar,
    Cinema,
}

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        QualityTier::Realtime,
        QualityTier::Draft,
        QualityTier::Standard,
        QualityTier::High,
        QualityTier::Pixar,
        QualityTier::Cinema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Realtime => "realtime",
            QualityTier::Draft => "draft",
            QualityTier::Standard => "standard",
            QualityTier::High => "high",
            QualityTier::Pixar => "pixar",
            QualityTier::Cinema => "cinema",
        }
    }

    /// Rough wall-clock estimate reported to clients in async mode.
    pub fn estimated_time(&self) -> Duration {
        let secs = match self {
            QualityTier::Realtime => 15,
            QualityTier::Draft => 30,
            QualityTier::Standard => 60,
            QualityTier::High => 90,
            QualityTier::Pixar => 150,
            QualityTier::Cinema => 240,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        QualityTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownQualityTier(s.to_string()))
    }
}

/// What the GPU worker is asked to produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Talking-head video from a still image and an audio track.
    #[default]
    LipsyncOnly,
    /// Silent looping animation (blinks, breathing) used while a persona
    /// is not speaking.
    IdleAnimation,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::LipsyncOnly => "lipsync_only",
            JobKind::IdleAnimation => "idle_animation",
        }
    }

    pub fn requires_audio(&self) -> bool {
        matches!(self, JobKind::LipsyncOnly)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lipsync_only" => Ok(JobKind::LipsyncOnly),
            "idle_animation" => Ok(JobKind::IdleAnimation),
            other => Err(ModelError::UnknownJobKind(other.to_string())),
        }
    }
}

/// Provider-agnostic description of one render.
///
/// `source_image` and `audio` are either `http(s)` URLs or base64 data URIs;
/// both are passed through to the worker untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJobInput {
    pub kind: JobKind,
    pub source_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default)]
    pub quality: QualityTier,
    /// Persona the render belongs to. Idle renders are built per persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
}

impl VideoJobInput {
    pub fn lipsync(
        source_image: impl Into<String>,
        audio: impl Into<String>,
        quality: QualityTier,
    ) -> Self {
        Self {
            kind: JobKind::LipsyncOnly,
            source_image: source_image.into(),
            audio: Some(audio.into()),
            quality,
            persona_id: None,
        }
    }

    pub fn idle(
        persona_id: impl Into<String>,
        source_image: impl Into<String>,
        quality: QualityTier,
    ) -> Self {
        Self {
            kind: JobKind::IdleAnimation,
            source_image: source_image.into(),
            audio: None,
            quality,
            persona_id: Some(persona_id.into()),
        }
    }
}
