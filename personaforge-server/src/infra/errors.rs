use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use personaforge_core::{VideoError, collaborators::CollaboratorError};
use personaforge_model::{ApiResponse, ModelError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let reason = self
            .status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string();
        let body = ApiResponse::<()>::error(self.message).with_message(reason);

        (self.status, Json(body)).into_response()
    }
}

impl From<VideoError> for AppError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::Validation(msg) => Self::bad_request(msg),
            VideoError::NotFound(job_id) => {
                Self::not_found(format!("job {job_id} not found"))
            }
            VideoError::Configuration(msg) => Self::service_unavailable(msg),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<CollaboratorError> for AppError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotConfigured { .. } => {
                Self::service_unavailable(err.to_string())
            }
            _ => Self::bad_gateway(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use personaforge_model::JobId;

    use super::*;

    #[test]
    fn video_errors_map_to_statuses() {
        let cases = [
            (
                VideoError::Validation("image required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (VideoError::NotFound(JobId::new()), StatusCode::NOT_FOUND),
            (
                VideoError::Configuration("no provider".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[tokio::test]
    async fn error_body_uses_the_response_envelope() {
        let response =
            AppError::not_found("job 42 not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "job 42 not found");
        assert_eq!(body["message"], "Not Found");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn collaborator_outage_is_bad_gateway() {
        let err = CollaboratorError::Empty {
            service: "anthropic",
        };
        assert_eq!(AppError::from(err).status, StatusCode::BAD_GATEWAY);
    }
}
