//! Core data model definitions shared across PersonaForge crates.
#![allow(missing_docs)]

pub mod api;
pub mod error;
pub mod ids;
pub mod input;
pub mod job;

// Intentionally curated re-exports for downstream consumers.
pub use api::{
    ApiResponse, IdleVideoRequest, JobStatusView, JobTicket, MakeVideoRequest,
    ResponseMode, TalkRequest, VideoAccepted, VideoResponse,
};
pub use error::{ModelError, Result};
pub use ids::{JobId, OwnerKey};
pub use input::{JobKind, QualityTier, VideoJobInput};
pub use job::{Job, JobResult, JobStatus, ProviderKind};
