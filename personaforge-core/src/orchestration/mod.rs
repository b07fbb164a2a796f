//! Job orchestration: polling, the single-flight job registry, provider
//! fallback and the service facade tying them together.

pub mod config;
pub mod fallback;
pub mod poller;
pub mod registry;
pub mod service;

pub use config::PollPolicy;
pub use fallback::{
    AttemptFailure, AttemptStage, FallbackCoordinator, Generation,
    NO_PROVIDER_NOTE, Submission,
};
pub use poller::{PollOutcome, PollReport, Poller};
pub use registry::{Acquire, InMemoryJobStore, JobStore};
pub use service::{VideoJobService, VideoOutcome};
