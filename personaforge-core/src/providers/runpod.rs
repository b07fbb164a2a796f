use std::fmt;

use async_trait::async_trait;
use personaforge_model::{JobKind, ProviderKind, VideoJobInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    ProviderError, ProviderStatus, SubmittedJob, VideoProvider, non_empty,
    read_json,
};

const KIND: ProviderKind = ProviderKind::RunPod;

/// Primary provider: a RunPod serverless endpoint running the lip-sync
/// worker.
pub struct RunPodProvider {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl fmt::Debug for RunPodProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPodProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RunPodProvider {
    /// `endpoint` is the full endpoint URL, e.g.
    /// `https://api.runpod.ai/v2/<endpoint-id>`.
    pub fn new(
        http: reqwest::Client,
        endpoint: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            endpoint: non_empty(endpoint)
                .map(|url| url.trim_end_matches('/').to_string()),
            api_key: non_empty(api_key),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        match (&self.endpoint, &self.api_key) {
            (Some(endpoint), Some(key)) => {
                Ok((endpoint.as_str(), key.as_str()))
            }
            _ => Err(ProviderError::NotConfigured { provider: KIND }),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input: WorkerInput<'a>,
}

/// Job types the worker dispatches on.
#[derive(Debug, Serialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
enum WorkerInput<'a> {
    LipsyncOnly {
        source_image: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        driven_audio: Option<&'a str>,
        quality: &'a str,
        job_id: String,
    },
    /// Renders one silent take per requested emotion and angle. A single
    /// neutral front take is the idle loop.
    PersonaBuild {
        persona_id: &'a str,
        primary_image: &'a str,
        takes_to_generate: [Take; 1],
        job_id: String,
    },
}

#[derive(Debug, Serialize)]
struct Take {
    emotion: &'static str,
    angle: &'static str,
}

const IDLE_TAKE: Take = Take {
    emotion: "neutral",
    angle: "front",
};

fn worker_input(
    input: &VideoJobInput,
) -> Result<WorkerInput<'_>, ProviderError> {
    let job_id = Uuid::new_v4().to_string();
    match input.kind {
        JobKind::LipsyncOnly => Ok(WorkerInput::LipsyncOnly {
            source_image: &input.source_image,
            driven_audio: input.audio.as_deref(),
            quality: input.quality.as_str(),
            job_id,
        }),
        JobKind::IdleAnimation => {
            let persona_id = input
                .persona_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .ok_or(ProviderError::MissingInput {
                    provider: KIND,
                    kind: input.kind,
                    field: "persona_id",
                })?;
            Ok(WorkerInput::PersonaBuild {
                persona_id,
                primary_image: &input.source_image,
                takes_to_generate: [IDLE_TAKE],
                job_id,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunPodJob {
    #[serde(default)]
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Shapes the worker output takes once RunPod wraps it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunPodOutput {
    Url(String),
    Direct { video: String },
    Nested { output: NestedOutput },
    Takes { metadata: TakesMetadata },
    WorkerFailure { success: bool, error: Value },
}

#[derive(Debug, Deserialize)]
struct NestedOutput {
    video: String,
}

/// Persona builds report their renders as takes; the first one is used.
#[derive(Debug, Deserialize)]
struct TakesMetadata {
    base_takes: Vec<RenderedTake>,
}

#[derive(Debug, Deserialize)]
struct RenderedTake {
    video_url: String,
}

fn error_text(
    value: Option<&Value>,
    fallback: impl FnOnce() -> String,
) -> String {
    match value {
        Some(Value::String(message)) if !message.trim().is_empty() => {
            message.clone()
        }
        Some(Value::Null) | None => fallback(),
        Some(other) => other.to_string(),
    }
}

fn parse_output(raw: &Value) -> Result<ProviderStatus, ProviderError> {
    let unrecognized = || ProviderError::UnrecognizedOutput {
        provider: KIND,
        body: raw.to_string(),
    };

    let parsed: RunPodOutput =
        serde_json::from_value(raw.clone()).map_err(|_| unrecognized())?;

    let video_url = match parsed {
        RunPodOutput::Url(url) => url,
        RunPodOutput::Direct { video } => video,
        RunPodOutput::Nested { output } => output.video,
        RunPodOutput::Takes { metadata } => {
            match metadata.base_takes.into_iter().next() {
                Some(take) => take.video_url,
                None => return Err(unrecognized()),
            }
        }
        RunPodOutput::WorkerFailure {
            success: false,
            error,
        } => {
            return Ok(ProviderStatus::Failed {
                error: error_text(Some(&error), || {
                    "worker reported failure".to_string()
                }),
            });
        }
        RunPodOutput::WorkerFailure { success: true, .. } => {
            return Err(unrecognized());
        }
    };

    if video_url.trim().is_empty() {
        return Err(unrecognized());
    }
    Ok(ProviderStatus::Completed { video_url })
}

fn normalize(job: &RunPodJob) -> Result<ProviderStatus, ProviderError> {
    match job.status.as_str() {
        "IN_QUEUE" | "IN_PROGRESS" => Ok(ProviderStatus::Processing),
        "COMPLETED" => match &job.output {
            Some(output) => parse_output(output),
            None => Err(ProviderError::UnrecognizedOutput {
                provider: KIND,
                body: "COMPLETED without output".to_string(),
            }),
        },
        "FAILED" | "CANCELLED" | "TIMED_OUT" => Ok(ProviderStatus::Failed {
            error: error_text(job.error.as_ref(), || {
                format!("runpod job {}", job.status.to_ascii_lowercase())
            }),
        }),
        other => Err(ProviderError::UnknownStatus {
            provider: KIND,
            status: other.to_string(),
        }),
    }
}

#[async_trait]
impl VideoProvider for RunPodProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    async fn submit(
        &self,
        input: &VideoJobInput,
    ) -> Result<SubmittedJob, ProviderError> {
        let (endpoint, api_key) = self.credentials()?;

        let body = RunRequest {
            input: worker_input(input)?,
        };

        let response = self
            .http
            .post(format!("{endpoint}/run"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: KIND,
                source,
            })?;

        let job: RunPodJob = read_json(KIND, response).await?;
        let external_id = job
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Decode {
                provider: KIND,
                message: "run response carried no job id".to_string(),
            })?;

        info!(
            provider = %KIND,
            external_id = %external_id,
            kind = %input.kind,
            quality = %input.quality,
            status = %job.status,
            "runpod job submitted"
        );

        Ok(SubmittedJob {
            external_id,
            status: normalize(&job)?,
        })
    }

    async fn check_status(
        &self,
        external_id: &str,
    ) -> Result<ProviderStatus, ProviderError> {
        let (endpoint, api_key) = self.credentials()?;

        let response = self
            .http
            .get(format!("{endpoint}/status/{external_id}"))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: KIND,
                source,
            })?;

        let job: RunPodJob = read_json(KIND, response).await?;
        debug!(
            provider = %KIND,
            external_id,
            status = %job.status,
            "runpod status"
        );
        normalize(&job)
    }
}
