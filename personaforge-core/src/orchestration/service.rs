use std::{fmt, sync::Arc, time::Duration};

use personaforge_model::{
    Job, JobId, JobResult, JobStatus, JobStatusView, JobTicket, OwnerKey,
    ProviderKind, VideoJobInput,
};
use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};

use super::{
    fallback::{FallbackCoordinator, Generation, NO_PROVIDER_NOTE, Submission},
    registry::{Acquire, JobStore},
};
use crate::{
    error::{Result, VideoError},
    providers::ProviderStatus,
};

/// Outcome of a synchronous render. `video_url` is `None` whenever the
/// result is degraded, with `note` saying why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub provider: Option<ProviderKind>,
    pub note: Option<String>,
    /// Another render for the same owner was already running; nothing new
    /// was started.
    pub already_active: bool,
}

impl VideoOutcome {
    fn already_processing(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            video_url: None,
            provider: job.provider,
            note: Some(format!(
                "already processing (job {}, {})",
                job.id, job.status
            )),
            already_active: true,
        }
    }
}

impl From<JobResult> for VideoOutcome {
    fn from(result: JobResult) -> Self {
        Self {
            job_id: result.job_id,
            status: result.status,
            video_url: result.video_url,
            provider: result.provider,
            note: result.error,
            already_active: false,
        }
    }
}

/// Entry point for everything that needs a video: single-flight per owner,
/// provider fallback, result caching.
#[derive(Clone)]
pub struct VideoJobService {
    store: Arc<dyn JobStore>,
    coordinator: Arc<FallbackCoordinator>,
    async_budget: Duration,
}

impl fmt::Debug for VideoJobService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoJobService")
            .field("coordinator", &self.coordinator)
            .field("active_jobs", &self.store.active_jobs().len())
            .field("async_budget", &self.async_budget)
            .finish()
    }
}

impl VideoJobService {
    /// `async_budget` bounds the whole background chain of an asynchronous
    /// job, fallbacks included.
    pub fn new(
        store: Arc<dyn JobStore>,
        coordinator: Arc<FallbackCoordinator>,
        async_budget: Duration,
    ) -> Self {
        Self {
            store,
            coordinator,
            async_budget,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<FallbackCoordinator> {
        &self.coordinator
    }

    /// Starts a render and returns at once. The first accepting provider is
    /// found inline; polling and any later fallback run on a spawned task
    /// whose progress is visible through [`Self::get_job_status`].
    pub async fn submit_video_job(
        &self,
        owner: OwnerKey,
        input: VideoJobInput,
    ) -> Result<JobTicket> {
        validate(&input)?;
        if !self.coordinator.has_configured_provider() {
            return Err(VideoError::Configuration(
                NO_PROVIDER_NOTE.to_string(),
            ));
        }

        let job = match self.store.try_acquire(Job::new(owner, &input)) {
            Acquire::Acquired(job) => job,
            Acquire::AlreadyActive(existing) => {
                info!(
                    owner = %existing.owner,
                    job_id = %existing.id,
                    status = %existing.status,
                    "job already in flight for owner"
                );
                return Ok(ticket(&existing, true));
            }
        };

        info!(
            owner = %job.owner,
            job_id = %job.id,
            kind = %input.kind,
            quality = %input.quality,
            "video job accepted"
        );

        let deadline = Instant::now() + self.async_budget;
        let guard = KeyGuard::new(Arc::clone(&self.store), &job);
        let mut failures = Vec::new();
        let Some(submission) =
            self.coordinator.submit_from(&input, 0, &mut failures).await
        else {
            let generation = Generation::degraded(failures);
            let result = finish(self.store.as_ref(), &job, generation);
            guard.disarm();
            return Ok(JobTicket {
                error: result.error.clone(),
                status: result.status,
                ..ticket(&job, false)
            });
        };

        let job = record_submission(self.store.as_ref(), job.id, &submission)
            .unwrap_or(job);
        let accepted = ticket(&job, false);

        let span = info_span!(
            "video_job",
            job_id = %job.id,
            owner = %job.owner,
        );
        let store = Arc::clone(&self.store);
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(
            async move {
                let job_id = job.id;
                let on_submit = |submission: &Submission| {
                    record_submission(store.as_ref(), job_id, submission);
                };
                let generation = coordinator
                    .drive(
                        &input,
                        deadline,
                        Some(submission),
                        failures,
                        &on_submit,
                    )
                    .await;
                finish(store.as_ref(), &job, generation);
                guard.disarm();
            }
            .instrument(span),
        );

        Ok(accepted)
    }

    /// Current view of a job. Terminal results are served from the cache;
    /// a locally timed-out job is checked once more with its provider in
    /// case the render finished after the poll gave up.
    pub async fn get_job_status(
        &self,
        job_id: JobId,
    ) -> Result<JobStatusView> {
        if let Some(result) = self.store.result_for_job(job_id) {
            let result = if result.status == JobStatus::TimedOut {
                self.reconcile(result).await
            } else {
                result
            };
            return Ok(JobStatusView::from(&result));
        }

        self.store
            .find(job_id)
            .map(|job| JobStatusView::from(&job))
            .ok_or(VideoError::NotFound(job_id))
    }

    /// Renders a video and waits for it, at most `budget` in total. Provider
    /// failures come back as a degraded outcome, never as an error.
    pub async fn generate_video_sync(
        &self,
        owner: OwnerKey,
        input: VideoJobInput,
        budget: Duration,
    ) -> Result<VideoOutcome> {
        validate(&input)?;

        let job = match self.store.try_acquire(Job::new(owner, &input)) {
            Acquire::Acquired(job) => job,
            Acquire::AlreadyActive(existing) => {
                info!(
                    owner = %existing.owner,
                    job_id = %existing.id,
                    "render requested while another is in flight"
                );
                return Ok(VideoOutcome::already_processing(&existing));
            }
        };

        let guard = KeyGuard::new(Arc::clone(&self.store), &job);
        let store = self.store.as_ref();
        let on_submit = |submission: &Submission| {
            record_submission(store, job.id, submission);
        };

        let generation = self
            .coordinator
            .generate(&input, budget, &on_submit)
            .instrument(info_span!(
                "video_sync",
                job_id = %job.id,
                owner = %job.owner,
            ))
            .await;
        let result = finish(store, &job, generation);
        guard.disarm();

        Ok(VideoOutcome::from(result))
    }

    /// Last completed result for `owner`, for re-serving without a render.
    pub fn cached_result(&self, owner: &OwnerKey) -> Option<JobResult> {
        self.store.latest_result(owner)
    }

    pub fn active_jobs(&self) -> Vec<Job> {
        self.store.active_jobs()
    }

    pub fn purge_results(&self, max_age: Duration) -> usize {
        self.store.purge_results(max_age)
    }

    async fn reconcile(&self, result: JobResult) -> JobResult {
        let (Some(kind), Some(external_id)) =
            (result.provider, result.external_id.as_deref())
        else {
            return result;
        };
        let Some(provider) = self.coordinator.provider(kind) else {
            return result;
        };

        match provider.check_status(external_id).await {
            Ok(ProviderStatus::Completed { video_url }) => {
                info!(
                    job_id = %result.job_id,
                    provider = %kind,
                    external_id,
                    "timed-out job finished late, reconciling"
                );
                let reconciled = result.reconciled(video_url);
                self.store.record_result(reconciled.clone());
                reconciled
            }
            Ok(ProviderStatus::Failed { error }) => {
                let failed = JobResult {
                    status: JobStatus::Failed,
                    error: Some(error),
                    ..result
                };
                self.store.record_result(failed.clone());
                failed
            }
            Ok(ProviderStatus::Processing) => result,
            Err(err) => {
                warn!(
                    job_id = %result.job_id,
                    provider = %kind,
                    error = %err,
                    "reconciliation check failed"
                );
                result
            }
        }
    }
}

fn validate(input: &VideoJobInput) -> Result<()> {
    if input.source_image.trim().is_empty() {
        return Err(VideoError::Validation(
            "a source image is required".to_string(),
        ));
    }
    let has_audio = input
        .audio
        .as_deref()
        .is_some_and(|audio| !audio.trim().is_empty());
    if input.kind.requires_audio() && !has_audio {
        return Err(VideoError::Validation(format!(
            "{} jobs require audio",
            input.kind
        )));
    }
    Ok(())
}

fn ticket(job: &Job, already_active: bool) -> JobTicket {
    JobTicket {
        job_id: job.id,
        status: job.status,
        estimated_time_ms: job.quality.estimated_time().as_millis() as u64,
        provider: job.provider,
        already_active,
        error: job.error.clone(),
    }
}

fn record_submission(
    store: &dyn JobStore,
    job_id: JobId,
    submission: &Submission,
) -> Option<Job> {
    let kind = submission.provider.kind();
    info!(
        job_id = %job_id,
        provider = %kind,
        external_id = %submission.external_id,
        "provider accepted job"
    );
    store.update(job_id, &mut |job| {
        job.mark_processing(kind, submission.external_id.clone())
    })
}

/// Records the terminal result for `job` and frees its owner key.
fn finish(
    store: &dyn JobStore,
    job: &Job,
    generation: Generation,
) -> JobResult {
    let mut finished = store.find(job.id).unwrap_or_else(|| job.clone());

    let result = match generation {
        Generation::Done {
            provider,
            external_id,
            video_url,
            ..
        } => {
            finished.mark_terminal(JobStatus::Completed, None);
            JobResult {
                provider: Some(provider),
                external_id: Some(external_id),
                ..JobResult::completed(&finished, video_url)
            }
        }
        Generation::Degraded { status, note, .. } => {
            finished.mark_terminal(status, Some(note.clone()));
            if status == JobStatus::TimedOut {
                JobResult {
                    error: Some(note),
                    ..JobResult::timed_out(&finished)
                }
            } else {
                JobResult::failed(&finished, note)
            }
        }
    };

    store.record_result(result.clone());
    store.release(&finished.owner, finished.id);

    info!(
        owner = %result.owner,
        job_id = %result.job_id,
        status = %result.status,
        provider = ?result.provider,
        attempts = finished.attempts,
        elapsed_ms = result.duration_ms,
        "video job finished"
    );
    result
}

/// Frees an owner key if the work holding it is dropped before finishing,
/// e.g. when a client disconnects mid-render.
struct KeyGuard {
    store: Arc<dyn JobStore>,
    owner: OwnerKey,
    job_id: JobId,
    armed: bool,
}

impl KeyGuard {
    fn new(store: Arc<dyn JobStore>, job: &Job) -> Self {
        Self {
            store,
            owner: job.owner.clone(),
            job_id: job.id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.armed && self.store.release(&self.owner, self.job_id).is_some()
        {
            warn!(
                owner = %self.owner,
                job_id = %self.job_id,
                "video job abandoned before finishing, key released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use personaforge_model::QualityTier;

    use super::*;
    use crate::{
        orchestration::{
            config::PollPolicy, poller::Poller, registry::InMemoryJobStore,
        },
        providers::{MockVideoProvider, SubmittedJob, VideoProvider},
    };

    const VIDEO: &str = "https://cdn/video.mp4";

    fn owner() -> OwnerKey {
        OwnerKey::new("persona-1").unwrap()
    }

    fn input() -> VideoJobInput {
        VideoJobInput::lipsync(
            "img.png",
            "data:audio/mpeg;base64,AAAA",
            QualityTier::Standard,
        )
    }

    fn service_with(
        providers: Vec<MockVideoProvider>,
        interval_ms: u64,
    ) -> VideoJobService {
        let providers = providers
            .into_iter()
            .map(|provider| Arc::new(provider) as Arc<dyn VideoProvider>)
            .collect();
        let poller = Poller::new(PollPolicy {
            interval_ms,
            timeout_ms: 30_000,
            max_consecutive_errors: 3,
        });
        VideoJobService::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(FallbackCoordinator::new(providers, poller)),
            Duration::from_secs(120),
        )
    }

    fn mock(
        kind: ProviderKind,
        external_id: &'static str,
    ) -> MockVideoProvider {
        let mut mock = MockVideoProvider::new();
        mock.expect_kind().return_const(kind);
        mock.expect_is_configured().return_const(true);
        mock.expect_submit().returning(move |_| {
            Ok(SubmittedJob {
                external_id: external_id.to_string(),
                status: ProviderStatus::Processing,
            })
        });
        mock
    }

    /// Reports processing for the first `processing_polls` checks, then
    /// completion. Returns the shared call counter.
    fn completes_after(
        mock: &mut MockVideoProvider,
        processing_polls: u32,
    ) -> Arc<AtomicU32> {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        mock.expect_check_status().returning(move |_| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= processing_polls {
                Ok(ProviderStatus::Processing)
            } else {
                Ok(ProviderStatus::Completed {
                    video_url: VIDEO.to_string(),
                })
            }
        });
        calls
    }

    #[tokio::test(start_paused = true)]
    async fn sync_render_completes_on_second_poll() {
        let mut primary = mock(ProviderKind::RunPod, "rp-1");
        let calls = completes_after(&mut primary, 1);
        let service = service_with(vec![primary], 2_000);

        let outcome = service
            .generate_video_sync(owner(), input(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(outcome.video_url.as_deref(), Some(VIDEO));
        assert_eq!(outcome.provider, Some(ProviderKind::RunPod));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(service.active_jobs().is_empty());
        assert_eq!(
            service.cached_result(&owner()).map(|r| r.job_id),
            Some(outcome.job_id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_of_completed_job_is_idempotent() {
        let mut primary = mock(ProviderKind::RunPod, "rp-1");
        let calls = completes_after(&mut primary, 0);
        let service = service_with(vec![primary], 2_000);

        let outcome = service
            .generate_video_sync(owner(), input(), Duration::from_secs(60))
            .await
            .unwrap();
        let first = service.get_job_status(outcome.job_id).await.unwrap();
        let second = service.get_job_status(outcome.job_id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.video_url.as_deref(), Some(VIDEO));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submits_reach_the_provider_once() {
        let mut primary = MockVideoProvider::new();
        primary.expect_kind().return_const(ProviderKind::RunPod);
        primary.expect_is_configured().return_const(true);
        primary.expect_submit().times(1).returning(|_| {
            Ok(SubmittedJob {
                external_id: "rp-1".into(),
                status: ProviderStatus::Processing,
            })
        });
        primary
            .expect_check_status()
            .returning(|_| Ok(ProviderStatus::Processing));
        let service = service_with(vec![primary], 2_000);

        let (first, second) = tokio::join!(
            service.submit_video_job(owner(), input()),
            service.submit_video_job(owner(), input()),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.job_id, second.job_id);
        assert!(first.already_active ^ second.already_active);
        assert_eq!(first.estimated_time_ms, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn async_job_falls_back_in_the_background() {
        let mut primary = mock(ProviderKind::RunPod, "rp-1");
        primary.expect_check_status().times(1).returning(|_| {
            Ok(ProviderStatus::Failed {
                error: "CUDA out of memory".into(),
            })
        });
        let mut secondary = mock(ProviderKind::Replicate, "rep-1");
        completes_after(&mut secondary, 1);
        let service = service_with(vec![primary, secondary], 1_000);

        let ticket = service.submit_video_job(owner(), input()).await.unwrap();
        assert_eq!(ticket.status, JobStatus::Processing);
        assert_eq!(ticket.provider, Some(ProviderKind::RunPod));

        tokio::time::sleep(Duration::from_secs(10)).await;

        let status = service.get_job_status(ticket.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.provider, Some(ProviderKind::Replicate));
        assert_eq!(status.video_url.as_deref(), Some(VIDEO));
        assert!(service.store().get(&owner()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_job_is_reconciled_on_status_query() {
        let mut primary = mock(ProviderKind::RunPod, "rp-1");
        let calls = completes_after(&mut primary, 3);
        let service = service_with(vec![primary], 2_000);

        let outcome = service
            .generate_video_sync(owner(), input(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::TimedOut);
        assert!(outcome.video_url.is_none());
        assert!(outcome.note.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let status = service.get_job_status(outcome.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.video_url.as_deref(), Some(VIDEO));

        service.get_job_status(outcome.job_id).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reconciliation_keeps_newer_cached_video() {
        let submits = Arc::new(AtomicU32::new(0));
        let old_polls = Arc::new(AtomicU32::new(0));
        let mut primary = MockVideoProvider::new();
        primary.expect_kind().return_const(ProviderKind::RunPod);
        primary.expect_is_configured().return_const(true);
        let counter = Arc::clone(&submits);
        primary.expect_submit().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SubmittedJob {
                external_id: format!("rp-{n}"),
                status: ProviderStatus::Processing,
            })
        });
        let counter = Arc::clone(&old_polls);
        primary.expect_check_status().returning(move |external_id| {
            if external_id != "rp-1" {
                return Ok(ProviderStatus::Completed {
                    video_url: "https://cdn/B-new.mp4".to_string(),
                });
            }
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= 3 {
                Ok(ProviderStatus::Processing)
            } else {
                Ok(ProviderStatus::Completed {
                    video_url: "https://cdn/A-old.mp4".to_string(),
                })
            }
        });
        let service = service_with(vec![primary], 2_000);

        let a = service
            .generate_video_sync(owner(), input(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(a.status, JobStatus::TimedOut);
        let b = service
            .generate_video_sync(owner(), input(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(b.status, JobStatus::Completed);

        let late = service.get_job_status(a.job_id).await.unwrap();
        assert_eq!(late.status, JobStatus::Completed);
        assert_eq!(late.video_url.as_deref(), Some("https://cdn/A-old.mp4"));

        let latest = service.cached_result(&owner()).unwrap();
        assert_eq!(latest.job_id, b.job_id);
        assert_eq!(latest.video_url.as_deref(), Some("https://cdn/B-new.mp4"));
    }

    #[tokio::test]
    async fn no_provider_degrades_sync_and_rejects_async() {
        let service = service_with(Vec::new(), 2_000);

        let outcome = service
            .generate_video_sync(owner(), input(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(outcome.video_url.is_none());
        assert_eq!(outcome.note.as_deref(), Some(NO_PROVIDER_NOTE));

        let err = service
            .submit_video_job(owner(), input())
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Configuration(_)));
    }

    #[tokio::test]
    async fn sync_render_while_key_is_busy_reports_already_processing() {
        let service = service_with(Vec::new(), 2_000);
        let busy = Job::new(owner(), &input());
        service.store().try_acquire(busy.clone());

        let outcome = service
            .generate_video_sync(owner(), input(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(outcome.already_active);
        assert_eq!(outcome.job_id, busy.id);
        assert!(
            outcome
                .note
                .as_deref()
                .is_some_and(|note| note.starts_with("already processing"))
        );
    }

    #[tokio::test]
    async fn missing_inputs_are_rejected_before_any_call() {
        let mut primary = MockVideoProvider::new();
        primary.expect_kind().return_const(ProviderKind::RunPod);
        primary.expect_is_configured().return_const(true);
        primary.expect_submit().never();
        let service = service_with(vec![primary], 2_000);

        let no_image = VideoJobInput::lipsync(
            " ",
            "data:audio/mpeg;base64,AAAA",
            QualityTier::Draft,
        );
        let err = service
            .submit_video_job(owner(), no_image)
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Validation(_)));

        let mut no_audio = input();
        no_audio.audio = None;
        let err = service
            .generate_video_sync(owner(), no_audio, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Validation(_)));
        assert!(service.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let service = service_with(Vec::new(), 2_000);
        let missing = JobId::new();
        let err = service.get_job_status(missing).await.unwrap_err();
        assert!(matches!(err, VideoError::NotFound(id) if id == missing));
    }
}
