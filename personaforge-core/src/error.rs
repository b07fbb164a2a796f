use personaforge_model::{JobId, ModelError};
use thiserror::Error;

/// Hard failures surfaced to callers of the video service.
///
/// Provider trouble never shows up here: it is absorbed into degraded
/// results or recorded on the job.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),
}

impl From<ModelError> for VideoError {
    fn from(err: ModelError) -> Self {
        VideoError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VideoError>;
