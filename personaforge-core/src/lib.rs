//! PersonaForge core: renders persona videos on external GPU providers.
//!
//! The pieces, leaf to root:
//!
//! - [`providers`] wrap each GPU service behind [`providers::VideoProvider`]
//!   and normalize its status and output vocabulary.
//! - [`orchestration::Poller`] drives one external job to a terminal state
//!   within a time budget.
//! - [`orchestration::JobStore`] enforces at most one in-flight job per owner
//!   and caches terminal results.
//! - [`orchestration::FallbackCoordinator`] walks the providers in
//!   preference order and degrades instead of failing.
//! - [`orchestration::VideoJobService`] is what request handlers call.
#![allow(missing_docs)]

pub mod collaborators;
pub mod error;
pub mod orchestration;
pub mod providers;

pub use error::{Result, VideoError};
pub use orchestration::{
    FallbackCoordinator, InMemoryJobStore, JobStore, PollPolicy, Poller,
    VideoJobService, VideoOutcome,
};
pub use providers::{
    ProviderError, ProviderStatus, ReplicateProvider, RunPodProvider,
    VideoProvider,
};
