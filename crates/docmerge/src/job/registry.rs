use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Job;

/// Concurrency-safe table of jobs keyed by id.
///
/// Readers get clones, so a poll never holds the lock while the caller looks
/// at the result. Writes go through [`JobRegistry::update`], which runs a
/// closure under the write lock. A poisoned lock is recovered rather than
/// propagated: every mutation is a small field update that cannot leave a
/// job half-written.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts `job`, replacing any previous job with the same id.
    pub fn register(&self, job: Job) {
        self.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Applies `f` to the job under the write lock and returns its result,
    /// or `None` when the job is unknown.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        self.write().get_mut(id).map(f)
    }

    pub fn delete(&self, id: &str) -> Option<Job> {
        self.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
