use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use super::config::PollPolicy;
use crate::providers::{ProviderStatus, VideoProvider};

/// How a poll loop ended. Timing out is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { video_url: String },
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    /// Status checks issued, including ones that errored.
    pub polls: u32,
    pub elapsed: Duration,
}

/// Bounded fixed-interval status loop over a single external job.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Polls `external_id` until it is terminal or `budget` has elapsed.
    ///
    /// Returns within `budget + interval`: sleeps are clamped to the
    /// deadline and a status check still in flight at the deadline is
    /// abandoned.
    pub async fn poll_until_done(
        &self,
        provider: &dyn VideoProvider,
        external_id: &str,
        budget: Duration,
    ) -> PollReport {
        let started = Instant::now();
        let deadline = started + budget;
        let interval = self.policy.interval();
        let max_errors = self.policy.max_consecutive_errors;
        let kind = provider.kind();

        let mut polls = 0;
        let mut consecutive_errors = 0;

        let outcome = loop {
            if Instant::now() >= deadline {
                break PollOutcome::TimedOut;
            }

            polls += 1;
            let checked =
                match timeout_at(deadline, provider.check_status(external_id))
                    .await
                {
                    Ok(checked) => checked,
                    Err(_) => break PollOutcome::TimedOut,
                };

            match checked {
                Ok(ProviderStatus::Completed { video_url }) => {
                    break PollOutcome::Completed { video_url };
                }
                Ok(ProviderStatus::Failed { error }) => {
                    break PollOutcome::Failed { error };
                }
                Ok(ProviderStatus::Processing) => {
                    consecutive_errors = 0;
                    debug!(
                        provider = %kind,
                        external_id,
                        polls,
                        "still processing"
                    );
                }
                Err(err) if err.is_transient() => {
                    consecutive_errors += 1;
                    warn!(
                        provider = %kind,
                        external_id,
                        consecutive_errors,
                        error = %err,
                        "status check failed, treating as still processing"
                    );
                    if max_errors > 0 && consecutive_errors >= max_errors {
                        break PollOutcome::Failed {
                            error: format!(
                                "{consecutive_errors} consecutive status check failures, last: {err}"
                            ),
                        };
                    }
                }
                Err(err) => {
                    warn!(
                        provider = %kind,
                        external_id,
                        error = %err,
                        "status check failed permanently"
                    );
                    break PollOutcome::Failed {
                        error: err.to_string(),
                    };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break PollOutcome::TimedOut;
            }
            sleep(interval.min(deadline - now)).await;
        };

        let elapsed = started.elapsed();
        info!(
            provider = %kind,
            external_id,
            polls,
            elapsed_ms = elapsed.as_millis() as u64,
            outcome = ?outcome,
            "poll finished"
        );

        PollReport {
            outcome,
            polls,
            elapsed,
        }
    }
}
