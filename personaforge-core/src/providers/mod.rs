//! Adapters for the external GPU services that render videos.
//!
//! Each provider speaks its own submit/status vocabulary and output shape;
//! the adapters normalize both into [`ProviderStatus`] so nothing above this
//! module ever inspects a provider-specific payload.

pub mod error;
pub mod replicate;
pub mod runpod;

use async_trait::async_trait;
use personaforge_model::{ProviderKind, VideoJobInput};
use serde::de::DeserializeOwned;

pub use error::ProviderError;
pub use replicate::ReplicateProvider;
pub use runpod::RunPodProvider;

/// Normalized status of an external job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Queued or running on the provider side.
    Processing,
    Completed { video_url: String },
    Failed { error: String },
}

/// A job accepted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub external_id: String,
    /// Status reported in the submit response itself. Usually
    /// [`ProviderStatus::Processing`].
    pub status: ProviderStatus,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether credentials and endpoint are present. Unconfigured providers
    /// are skipped by the fallback chain.
    fn is_configured(&self) -> bool;

    async fn submit(
        &self,
        input: &VideoJobInput,
    ) -> Result<SubmittedJob, ProviderError>;

    async fn check_status(
        &self,
        external_id: &str,
    ) -> Result<ProviderStatus, ProviderError>;
}

/// Reads a provider response, turning non-2xx statuses into
/// [`ProviderError::Http`] with the raw body preserved.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ProviderError::Network { provider, source })?;

    if !status.is_success() {
        return Err(ProviderError::Http {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| ProviderError::Decode {
        provider,
        message: err.to_string(),
    })
}

/// Non-empty trimmed value, or `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
