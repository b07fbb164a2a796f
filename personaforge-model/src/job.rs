use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ModelError,
    ids::{JobId, OwnerKey},
    input::{JobKind, QualityTier, VideoJobInput},
};

/// External GPU services able to render a video job.
///
/// `RunPod` is the primary provider, `Replicate` the secondary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "runpod")]
    RunPod,
    Replicate,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::RunPod => "runpod",
            ProviderKind::Replicate => "replicate",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "runpod" => Ok(ProviderKind::RunPod),
            "replicate" => Ok(ProviderKind::Replicate),
            _ => Err(ModelError::UnknownProvider(s.to_string())),
        }
    }
}

/// Lifecycle of a job as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// No further local transitions happen once a job is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outstanding request to an external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerKey,
    pub kind: JobKind,
    pub quality: QualityTier,
    pub provider: Option<ProviderKind>,
    pub external_id: Option<String>,
    pub status: JobStatus,
    /// Provider attempts made so far, including the current one.
    pub attempts: u32,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(owner: OwnerKey, input: &VideoJobInput) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner,
            kind: input.kind,
            quality: input.quality,
            provider: None,
            external_id: None,
            status: JobStatus::Submitted,
            attempts: 0,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Records that `provider` accepted the job under `external_id`.
    pub fn mark_processing(
        &mut self,
        provider: ProviderKind,
        external_id: impl Into<String>,
    ) {
        self.provider = Some(provider);
        self.external_id = Some(external_id.into());
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.touch();
    }

    pub fn mark_terminal(&mut self, status: JobStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error = error;
        self.touch();
    }

    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Terminal outcome of a job. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub owner: OwnerKey,
    pub kind: JobKind,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub provider: Option<ProviderKind>,
    pub external_id: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn completed(job: &Job, video_url: impl Into<String>) -> Self {
        Self::from_job(job, JobStatus::Completed, Some(video_url.into()), None)
    }

    pub fn failed(job: &Job, error: impl Into<String>) -> Self {
        Self::from_job(job, JobStatus::Failed, None, Some(error.into()))
    }

    pub fn timed_out(job: &Job) -> Self {
        Self::from_job(
            job,
            JobStatus::TimedOut,
            None,
            Some(format!("no terminal status after {}ms", job.elapsed_ms())),
        )
    }

    fn from_job(
        job: &Job,
        status: JobStatus,
        video_url: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            job_id: job.id,
            owner: job.owner.clone(),
            kind: job.kind,
            status,
            video_url,
            provider: job.provider,
            external_id: job.external_id.clone(),
            error,
            duration_ms: job.elapsed_ms(),
            completed_at: Utc::now(),
        }
    }

    /// Same result with the video that turned up after a local timeout.
    pub fn reconciled(&self, video_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            video_url: Some(video_url.into()),
            error: None,
            completed_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        let owner = OwnerKey::new("persona-1").unwrap();
        let input = VideoJobInput::lipsync(
            "img.png",
            "data:audio/mpeg;base64,AAAA",
            QualityTier::Standard,
        );
        Job::new(owner, &input)
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
    }

    #[test]
    fn processing_records_provider_and_counts_attempts() {
        let mut job = sample_job();
        job.mark_processing(ProviderKind::RunPod, "rp-1");
        job.mark_processing(ProviderKind::Replicate, "rep-1");

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.provider, Some(ProviderKind::Replicate));
        assert_eq!(job.external_id.as_deref(), Some("rep-1"));
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn reconciled_result_keeps_identity() {
        let mut job = sample_job();
        job.mark_processing(ProviderKind::RunPod, "rp-1");
        let timed_out = JobResult::timed_out(&job);
        let done = timed_out.reconciled("https://cdn/video.mp4");

        assert_eq!(done.job_id, job.id);
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.external_id.as_deref(), Some("rp-1"));
        assert!(done.error.is_none());
    }

    #[test]
    fn provider_kind_parses_config_names() {
        assert_eq!("RunPod".parse(), Ok(ProviderKind::RunPod));
        assert_eq!(" replicate".parse(), Ok(ProviderKind::Replicate));
        assert!("fal".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&JobStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        let json = serde_json::to_string(&ProviderKind::RunPod).unwrap();
        assert_eq!(json, "\"runpod\"");
    }
}
