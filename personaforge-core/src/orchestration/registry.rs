use std::{fmt, time::Duration};

use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use personaforge_model::{Job, JobId, JobResult, JobStatus, OwnerKey};
use tracing::debug;

/// Result of [`JobStore::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// The new job now owns the key.
    Acquired(Job),
    /// Another job for the same key is still in flight; nothing was inserted.
    AlreadyActive(Job),
}

/// In-process registry of active jobs plus the cache of terminal results.
///
/// All methods are synchronous so that no await point can ever separate a
/// check from the insert that depends on it.
pub trait JobStore: Send + Sync {
    /// Atomically inserts `job` under its owner key unless a non-terminal
    /// job already holds that key. A terminal leftover is replaced.
    fn try_acquire(&self, job: Job) -> Acquire;

    /// Active job for `owner`.
    fn get(&self, owner: &OwnerKey) -> Option<Job>;

    /// Active job by id.
    fn find(&self, job_id: JobId) -> Option<Job>;

    /// Applies `apply` to the active job `job_id` and returns the updated
    /// copy. `None` if the job is no longer active.
    fn update(
        &self,
        job_id: JobId,
        apply: &mut dyn FnMut(&mut Job),
    ) -> Option<Job>;

    /// Drops the key held by `job_id`. A newer job holding the same key is
    /// left alone.
    fn release(&self, owner: &OwnerKey, job_id: JobId) -> Option<Job>;

    fn active_jobs(&self) -> Vec<Job>;

    /// Stores a terminal result. A completed result becomes the owner's
    /// latest unless a newer job already holds that place; a late
    /// reconciliation never displaces a fresher video.
    fn record_result(&self, result: JobResult);

    fn result_for_job(&self, job_id: JobId) -> Option<JobResult>;

    /// Most recent completed result for `owner`.
    fn latest_result(&self, owner: &OwnerKey) -> Option<JobResult>;

    /// Drops cached results older than `max_age`; returns how many went.
    fn purge_results(&self, max_age: Duration) -> usize;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    active: DashMap<OwnerKey, Job>,
    owners: DashMap<JobId, OwnerKey>,
    results: DashMap<JobId, JobResult>,
    latest: DashMap<OwnerKey, JobResult>,
}

impl fmt::Debug for InMemoryJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryJobStore")
            .field("active", &self.active.len())
            .field("results", &self.results.len())
            .finish()
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn try_acquire(&self, job: Job) -> Acquire {
        match self.active.entry(job.owner.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if !existing.status.is_terminal() {
                    return Acquire::AlreadyActive(existing.clone());
                }
                self.owners.remove(&existing.id);
                self.owners.insert(job.id, job.owner.clone());
                occupied.insert(job.clone());
                Acquire::Acquired(job)
            }
            Entry::Vacant(vacant) => {
                self.owners.insert(job.id, job.owner.clone());
                vacant.insert(job.clone());
                Acquire::Acquired(job)
            }
        }
    }

    fn get(&self, owner: &OwnerKey) -> Option<Job> {
        self.active.get(owner).map(|job| job.value().clone())
    }

    fn find(&self, job_id: JobId) -> Option<Job> {
        let owner = self.owners.get(&job_id)?.clone();
        self.active
            .get(&owner)
            .filter(|job| job.id == job_id)
            .map(|job| job.value().clone())
    }

    fn update(
        &self,
        job_id: JobId,
        apply: &mut dyn FnMut(&mut Job),
    ) -> Option<Job> {
        let owner = self.owners.get(&job_id)?.clone();
        let mut job = self.active.get_mut(&owner)?;
        if job.id != job_id {
            return None;
        }
        apply(job.value_mut());
        Some(job.value().clone())
    }

    fn release(&self, owner: &OwnerKey, job_id: JobId) -> Option<Job> {
        let (_, job) =
            self.active.remove_if(owner, |_, job| job.id == job_id)?;
        self.owners.remove(&job_id);
        debug!(
            owner = %owner,
            job_id = %job_id,
            status = %job.status,
            "released job key"
        );
        Some(job)
    }

    fn active_jobs(&self) -> Vec<Job> {
        self.active.iter().map(|entry| entry.value().clone()).collect()
    }

    fn record_result(&self, result: JobResult) {
        if result.status == JobStatus::Completed {
            match self.latest.entry(result.owner.clone()) {
                // Job ids are v7, so id order is submission order.
                Entry::Occupied(mut occupied)
                    if occupied.get().job_id <= result.job_id =>
                {
                    occupied.insert(result.clone());
                }
                Entry::Occupied(occupied) => {
                    debug!(
                        owner = %result.owner,
                        job_id = %result.job_id,
                        newer = %occupied.get().job_id,
                        "older result kept out of latest"
                    );
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(result.clone());
                }
            }
        }
        self.results.insert(result.job_id, result);
    }

    fn result_for_job(&self, job_id: JobId) -> Option<JobResult> {
        self.results.get(&job_id).map(|result| result.value().clone())
    }

    fn latest_result(&self, owner: &OwnerKey) -> Option<JobResult> {
        self.latest.get(owner).map(|result| result.value().clone())
    }

    fn purge_results(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;
        let before = self.results.len();
        self.results.retain(|_, result| result.completed_at >= cutoff);
        self.latest.retain(|_, result| result.completed_at >= cutoff);
        before.saturating_sub(self.results.len())
    }
}
