//! Request and response bodies exchanged with HTTP clients.

use serde::{Deserialize, Serialize};

use crate::{
    ids::{JobId, OwnerKey},
    job::{Job, JobResult, JobStatus, ProviderKind},
};

/// Uniform envelope around every JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(error),
            message: None,
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

/// Whether the caller waits for the render or polls for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Sync,
    Async,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MakeVideoRequest {
    pub persona_id: String,
    /// Script to speak verbatim. Takes precedence over `message`.
    #[serde(default)]
    pub text: Option<String>,
    /// Prompt for the text generator when no script is given.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub mode: ResponseMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TalkRequest {
    pub persona_id: String,
    pub message: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdleVideoRequest {
    pub persona_id: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    /// Ignore a cached idle video and render a new one.
    #[serde(default)]
    pub refresh: bool,
}

/// Body of the synchronous video routes.
///
/// `video_url` is `null` whenever the render could not be produced; `note`
/// then says why and whatever text or audio was already produced is still
/// returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResponse {
    pub text: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

/// Returned immediately by asynchronous submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_time_ms: u64,
    pub provider: Option<ProviderKind>,
    /// True when an in-flight job for the same owner was returned instead of
    /// starting a new one.
    pub already_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of an asynchronous make-video submission: the text and audio are
/// ready now, the video is tracked by the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAccepted {
    pub text: Option<String>,
    pub audio_url: Option<String>,
    #[serde(flatten)]
    pub ticket: JobTicket,
}

/// Snapshot served by the job status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub owner: OwnerKey,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            owner: job.owner.clone(),
            status: job.status,
            video_url: None,
            provider: job.provider,
            error: job.error.clone(),
            elapsed_ms: job.elapsed_ms(),
        }
    }
}

impl From<&JobResult> for JobStatusView {
    fn from(result: &JobResult) -> Self {
        Self {
            job_id: result.job_id,
            owner: result.owner.clone(),
            status: result.status,
            video_url: result.video_url.clone(),
            provider: result.provider,
            error: result.error.clone(),
            elapsed_ms: result.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_video_request_defaults_to_sync() {
        let request: MakeVideoRequest =
            serde_json::from_str(r#"{"persona_id":"p1","text":"hi"}"#)
                .unwrap();
        assert_eq!(request.mode, ResponseMode::Sync);
        assert!(request.image.is_none());
    }

    #[test]
    fn accepted_body_flattens_ticket() {
        let accepted = VideoAccepted {
            text: Some("hello".into()),
            audio_url: None,
            ticket: JobTicket {
                job_id: JobId::new(),
                status: JobStatus::Processing,
                estimated_time_ms: 60_000,
                provider: Some(ProviderKind::RunPod),
                already_active: false,
                error: None,
            },
        };
        let value = serde_json::to_value(&accepted).unwrap();
        assert_eq!(value["estimated_time_ms"], 60_000);
        assert_eq!(value["provider"], "runpod");
        assert_eq!(value["text"], "hello");
        assert!(value.get("ticket").is_none());
    }

    #[test]
    fn degraded_response_serializes_null_video() {
        let response = VideoResponse {
            text: Some("hello".into()),
            audio_url: Some("data:audio/mpeg;base64,AAAA".into()),
            note: Some("no video provider configured".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["video_url"].is_null());
        assert_eq!(value["note"], "no video provider configured");
        assert!(value.get("job_id").is_none());
    }
}
