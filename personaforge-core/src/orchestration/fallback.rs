use std::{fmt, sync::Arc, time::Duration};

use personaforge_model::{JobStatus, ProviderKind, VideoJobInput};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::poller::{PollOutcome, Poller};
use crate::providers::{ProviderStatus, VideoProvider};

/// Note attached to degraded results when there is nobody to ask.
pub const NO_PROVIDER_NOTE: &str = "no video provider configured";

/// Where a provider attempt went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Submit,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub provider: ProviderKind,
    pub stage: AttemptStage,
    pub reason: String,
    pub timed_out: bool,
}

/// A job accepted by one provider in the chain.
#[derive(Clone)]
pub struct Submission {
    /// Position of the provider in the preference order.
    pub index: usize,
    pub provider: Arc<dyn VideoProvider>,
    pub external_id: String,
    pub initial: ProviderStatus,
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("index", &self.index)
            .field("provider", &self.provider.kind())
            .field("external_id", &self.external_id)
            .field("initial", &self.initial)
            .finish()
    }
}

/// Terminal state of one pass through the provider chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Done {
        provider: ProviderKind,
        external_id: String,
        video_url: String,
        failures: Vec<AttemptFailure>,
    },
    /// No video. `status` is `TimedOut` when the last attempt ran out of
    /// time, `Failed` otherwise.
    Degraded {
        status: JobStatus,
        note: String,
        failures: Vec<AttemptFailure>,
    },
}

impl Generation {
    pub fn degraded(failures: Vec<AttemptFailure>) -> Self {
        let status = match failures.last() {
            Some(last) if last.timed_out => JobStatus::TimedOut,
            _ => JobStatus::Failed,
        };
        Generation::Degraded {
            status,
            note: summarize(&failures),
            failures,
        }
    }
}

/// Human-readable account of every failed attempt, in order.
pub fn summarize(failures: &[AttemptFailure]) -> String {
    if failures.is_empty() {
        return NO_PROVIDER_NOTE.to_string();
    }
    let attempts = failures
        .iter()
        .map(|failure| format!("{}: {}", failure.provider, failure.reason))
        .collect::<Vec<_>>()
        .join("; ");
    format!("video generation failed ({attempts})")
}

/// Callback fired whenever a provider accepts the job.
pub type OnSubmit<'a> = dyn Fn(&Submission) + Send + Sync + 'a;

/// Walks providers in preference order, moving on whenever a submission or
/// its poll fails. The same provider is never tried twice in one pass.
pub struct FallbackCoordinator {
    providers: Vec<Arc<dyn VideoProvider>>,
    poller: Poller,
}

impl fmt::Debug for FallbackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order: Vec<_> = self
            .providers
            .iter()
            .map(|provider| (provider.kind(), provider.is_configured()))
            .collect();
        f.debug_struct("FallbackCoordinator")
            .field("providers", &order)
            .field("poller", &self.poller)
            .finish()
    }
}

impl FallbackCoordinator {
    pub fn new(
        providers: Vec<Arc<dyn VideoProvider>>,
        poller: Poller,
    ) -> Self {
        Self { providers, poller }
    }

    pub fn has_configured_provider(&self) -> bool {
        self.providers.iter().any(|provider| provider.is_configured())
    }

    pub fn configured_kinds(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|provider| provider.is_configured())
            .map(|provider| provider.kind())
            .collect()
    }

    pub fn provider(
        &self,
        kind: ProviderKind,
    ) -> Option<&Arc<dyn VideoProvider>> {
        self.providers.iter().find(|provider| provider.kind() == kind)
    }

    /// Submits to the first configured provider at or after `start` that
    /// accepts the job. Failed submissions are appended to `failures`.
    pub async fn submit_from(
        &self,
        input: &VideoJobInput,
        start: usize,
        failures: &mut Vec<AttemptFailure>,
    ) -> Option<Submission> {
        for (index, provider) in self.providers.iter().enumerate().skip(start)
        {
            let kind = provider.kind();
            if !provider.is_configured() {
                debug!(provider = %kind, "skipping unconfigured provider");
                continue;
            }

            match provider.submit(input).await {
                Ok(submitted) => {
                    return Some(Submission {
                        index,
                        provider: Arc::clone(provider),
                        external_id: submitted.external_id,
                        initial: submitted.status,
                    });
                }
                Err(err) => {
                    warn!(
                        provider = %kind,
                        error = %err,
                        "submission failed, trying next provider"
                    );
                    failures.push(AttemptFailure {
                        provider: kind,
                        stage: AttemptStage::Submit,
                        reason: err.to_string(),
                        timed_out: false,
                    });
                }
            }
        }
        None
    }

    /// Runs the whole chain: submit, poll, fall back, until a video is
    /// produced or the chain or `budget` is exhausted.
    pub async fn generate(
        &self,
        input: &VideoJobInput,
        budget: Duration,
        on_submit: &OnSubmit<'_>,
    ) -> Generation {
        let deadline = Instant::now() + budget;
        self.drive(input, deadline, None, Vec::new(), on_submit).await
    }

    /// Continues a pass whose first submission already happened. `pending`
    /// is followed first, then the remaining providers after it.
    pub async fn drive(
        &self,
        input: &VideoJobInput,
        deadline: Instant,
        mut pending: Option<Submission>,
        mut failures: Vec<AttemptFailure>,
        on_submit: &OnSubmit<'_>,
    ) -> Generation {
        let mut next = 0;

        loop {
            let submission = match pending.take() {
                Some(submission) => submission,
                None => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    match self.submit_from(input, next, &mut failures).await {
                        Some(submission) => {
                            on_submit(&submission);
                            submission
                        }
                        None => break,
                    }
                }
            };
            next = submission.index + 1;
            let kind = submission.provider.kind();

            match self.follow(&submission, deadline).await {
                PollOutcome::Completed { video_url } => {
                    info!(
                        provider = %kind,
                        external_id = %submission.external_id,
                        "video ready"
                    );
                    return Generation::Done {
                        provider: kind,
                        external_id: submission.external_id,
                        video_url,
                        failures,
                    };
                }
                PollOutcome::Failed { error } => {
                    warn!(
                        provider = %kind,
                        external_id = %submission.external_id,
                        error = %error,
                        "provider job failed, trying next provider"
                    );
                    failures.push(AttemptFailure {
                        provider: kind,
                        stage: AttemptStage::Poll,
                        reason: error,
                        timed_out: false,
                    });
                }
                PollOutcome::TimedOut => {
                    warn!(
                        provider = %kind,
                        external_id = %submission.external_id,
                        "provider job timed out locally"
                    );
                    failures.push(AttemptFailure {
                        provider: kind,
                        stage: AttemptStage::Poll,
                        reason: "timed out waiting for the render".to_string(),
                        timed_out: true,
                    });
                }
            }
        }

        let generation = Generation::degraded(failures);
        if let Generation::Degraded { note, .. } = &generation {
            warn!(note = %note, "video generation degraded");
        }
        generation
    }

    async fn follow(
        &self,
        submission: &Submission,
        deadline: Instant,
    ) -> PollOutcome {
        match &submission.initial {
            ProviderStatus::Completed { video_url } => {
                return PollOutcome::Completed {
                    video_url: video_url.clone(),
                };
            }
            ProviderStatus::Failed { error } => {
                return PollOutcome::Failed {
                    error: error.clone(),
                };
            }
            ProviderStatus::Processing => {}
        }

        let budget = self
            .poller
            .policy()
            .timeout()
            .min(deadline.saturating_duration_since(Instant::now()));
        self.poller
            .poll_until_done(
                submission.provider.as_ref(),
                &submission.external_id,
                budget,
            )
            .await
            .outcome
    }
}
