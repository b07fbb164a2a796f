use std::fmt;

use async_trait::async_trait;
use personaforge_model::{JobKind, ProviderKind, VideoJobInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    ProviderError, ProviderStatus, SubmittedJob, VideoProvider, non_empty,
    read_json,
};

const KIND: ProviderKind = ProviderKind::Replicate;

pub const DEFAULT_REPLICATE_BASE: &str = "https://api.replicate.com/v1";

/// Secondary provider: a hosted lip-sync model version on Replicate.
///
/// Only talking-head renders are supported; other job kinds are rejected
/// with [`ProviderError::Unsupported`] before any request is made.
pub struct ReplicateProvider {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    model_version: Option<String>,
}

impl fmt::Debug for ReplicateProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateProvider")
            .field("base_url", &self.base_url)
            .field("model_version", &self.model_version)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ReplicateProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        api_token: Option<String>,
        model_version: Option<String>,
    ) -> Self {
        let base_url = non_empty(base_url)
            .unwrap_or_else(|| DEFAULT_REPLICATE_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            base_url,
            api_token: non_empty(api_token),
            model_version: non_empty(model_version),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        match (&self.api_token, &self.model_version) {
            (Some(token), Some(version)) => {
                Ok((token.as_str(), version.as_str()))
            }
            _ => Err(ProviderError::NotConfigured { provider: KIND }),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    image: &'a str,
    audio: &'a str,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplicateOutput {
    Url(String),
    /// Intermediate frames or previews first; the final render is last.
    Urls(Vec<String>),
}

fn normalize(
    prediction: &Prediction,
) -> Result<ProviderStatus, ProviderError> {
    match prediction.status.as_str() {
        "starting" | "processing" => Ok(ProviderStatus::Processing),
        "succeeded" => {
            let unrecognized = || ProviderError::UnrecognizedOutput {
                provider: KIND,
                body: prediction
                    .output
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "null".to_string()),
            };
            let output = prediction.output.clone().ok_or_else(unrecognized)?;
            let video_url = match serde_json::from_value(output) {
                Ok(ReplicateOutput::Url(url)) => Some(url),
                Ok(ReplicateOutput::Urls(urls)) => urls.into_iter().last(),
                Err(_) => None,
            }
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(unrecognized)?;
            Ok(ProviderStatus::Completed { video_url })
        }
        "failed" | "canceled" => Ok(ProviderStatus::Failed {
            error: match &prediction.error {
                Some(Value::String(message)) => message.clone(),
                Some(Value::Null) | None => {
                    format!("replicate prediction {}", prediction.status)
                }
                Some(other) => other.to_string(),
            },
        }),
        other => Err(ProviderError::UnknownStatus {
            provider: KIND,
            status: other.to_string(),
        }),
    }
}

#[async_trait]
impl VideoProvider for ReplicateProvider {
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
        let (token, version) = self.credentials()?;

        let audio = match (input.kind, input.audio.as_deref()) {
            (JobKind::LipsyncOnly, Some(audio)) => audio,
            (kind, _) => {
                return Err(ProviderError::Unsupported {
                    provider: KIND,
                    kind,
                });
            }
        };

        let body = PredictionRequest {
            version,
            input: PredictionInput {
                image: &input.source_image,
                audio,
            },
        };

        let response = self
            .http
            .post(format!("{}/predictions", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: KIND,
                source,
            })?;

        let prediction: Prediction = read_json(KIND, response).await?;
        info!(
            provider = %KIND,
            external_id = %prediction.id,
            status = %prediction.status,
            "replicate prediction created"
        );

        Ok(SubmittedJob {
            status: normalize(&prediction)?,
            external_id: prediction.id,
        })
    }

    async fn check_status(
        &self,
        external_id: &str,
    ) -> Result<ProviderStatus, ProviderError> {
        let (token, _) = self.credentials()?;

        let response = self
            .http
            .get(format!("{}/predictions/{external_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: KIND,
                source,
            })?;

        let prediction: Prediction = read_json(KIND, response).await?;
        debug!(
            provider = %KIND,
            external_id,
            status = %prediction.status,
            "replicate status"
        );
        normalize(&prediction)
    }
}

#[cfg(test)]
mod tests {
    use personaforge_model::QualityTier;
    use serde_json::json;

    use super::*;

    fn prediction(value: Value) -> Prediction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn vocabulary_maps_onto_shared_statuses() {
        for status in ["starting", "processing"] {
            let parsed =
                normalize(&prediction(json!({"id": "p", "status": status})));
            assert_eq!(parsed.unwrap(), ProviderStatus::Processing);
        }

        let parsed = normalize(&prediction(json!({
            "id": "p",
            "status": "failed",
            "error": "invalid audio",
        })));
        assert_eq!(
            parsed.unwrap(),
            ProviderStatus::Failed {
                error: "invalid audio".into()
            }
        );
    }

    #[test]
    fn list_output_takes_the_final_url() {
        let parsed = normalize(&prediction(json!({
            "id": "p",
            "status": "succeeded",
            "output": ["https://cdn/preview.mp4", "https://cdn/final.mp4"],
        })));
        assert_eq!(
            parsed.unwrap(),
            ProviderStatus::Completed {
                video_url: "https://cdn/final.mp4".into()
            }
        );
    }

    #[test]
    fn empty_or_odd_output_is_unrecognized() {
        for output in [json!([]), json!({"video": 3}), json!(null)] {
            let err = normalize(&prediction(json!({
                "id": "p",
                "status": "succeeded",
                "output": output,
            })))
            .unwrap_err();
            assert!(matches!(err, ProviderError::UnrecognizedOutput { .. }));
        }
    }

    #[tokio::test]
    async fn idle_animation_is_unsupported() {
        let provider = ReplicateProvider::new(
            reqwest::Client::new(),
            None,
            Some("r8_token".into()),
            Some("version-hash".into()),
        );
        assert!(provider.is_configured());

        let input =
            VideoJobInput::idle("persona-1", "img.png", QualityTier::Draft);
        let err = provider.submit(&input).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Unsupported {
                kind: JobKind::IdleAnimation,
                ..
            }
        ));
    }
}
