use std::path::PathBuf;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::job::{FailedFile, JobRegistry};

/// Events emitted by the pipeline while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Step { progress: u8, message: String },
    FileSucceeded { filename: String },
    FileFailed { failed: FailedFile },
    Completed { result_path: PathBuf, message: String },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and one-off CLI runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Applies pipeline events to the job's registry entry and broadcasts the
/// resulting snapshot.
pub struct RegistryProgress {
    job_id: String,
    registry: JobRegistry,
    broadcaster: JobProgressBroadcaster,
}

impl RegistryProgress {
    pub fn new(job_id: &str, registry: JobRegistry, broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            job_id: job_id.to_string(),
            registry,
            broadcaster,
        }
    }
}

impl ProgressReporter for RegistryProgress {
    fn report(&self, event: ProgressEvent) {
        let mut failure = None;
        let snapshot = self.registry.update(&self.job_id, |job| {
            let changed = match event {
                ProgressEvent::Step { progress, message } => job.advance(progress, message),
                ProgressEvent::FileSucceeded { .. } => {
                    job.record_success();
                    true
                }
                ProgressEvent::FileFailed { failed } => {
                    failure = Some(format!("{}: {}", failed.filename, failed.reason));
                    job.record_failure(failed);
                    true
                }
                ProgressEvent::Completed {
                    result_path,
                    message,
                } => job.complete(result_path, message),
                ProgressEvent::Failed { error } => job.fail(error),
            };
            changed.then(|| JobProgressEvent::from_job(job))
        });

        match snapshot {
            Some(Some(event)) => {
                let event = match failure {
                    Some(detail) => event.with_failure(detail),
                    None => event,
                };
                self.broadcaster.send(event);
            }
            Some(None) => {
                log::debug!("Ignoring update for finished job {}", self.job_id);
            }
            None => {
                log::warn!("Progress for unknown job {}", self.job_id);
            }
        }
    }
}
