pub mod registry;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pdf::Position;

pub use registry::JobRegistry;

/// Lifecycle state of a job. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Processing,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// One batch file that did not make it into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub filename: String,
    pub reason: String,
}

impl FailedFile {
    pub fn new(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            reason: reason.into(),
        }
    }
}

/// A submitted job as tracked by the registry.
///
/// The mutators keep three rules: progress never goes down, a terminal state
/// is never left, and `result_path` is set exactly when the job completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub status_message: String,
    pub progress: u8,
    pub total_files: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failed_files: Vec<FailedFile>,
    pub result_path: Option<PathBuf>,
    pub document_name: String,
    pub position: Position,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        document_name: impl Into<String>,
        position: Position,
        total_files: usize,
    ) -> Self {
        Self {
            id: id.into(),
            state: JobState::Processing,
            status_message: "Queued".to_string(),
            progress: 0,
            total_files,
            processed_count: 0,
            success_count: 0,
            failed_files: Vec::new(),
            result_path: None,
            document_name: document_name.into(),
            position,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves progress forward and replaces the status text. Ignored once the
    /// job is terminal; progress below the current value is clamped.
    /// Returns whether anything changed.
    pub fn advance(&mut self, progress: u8, status: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        // 100 is reserved for completion
        self.progress = self.progress.max(progress.min(99));
        self.status_message = status.into();
        true
    }

    pub fn record_success(&mut self) {
        if !self.is_terminal() {
            self.processed_count += 1;
            self.success_count += 1;
        }
    }

    pub fn record_failure(&mut self, failed: FailedFile) {
        if !self.is_terminal() {
            self.processed_count += 1;
            self.failed_files.push(failed);
        }
    }

    pub fn complete(&mut self, result_path: PathBuf, status: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = JobState::Completed;
        self.progress = 100;
        self.status_message = status.into();
        self.result_path = Some(result_path);
        self.finished_at = Some(Utc::now());
        true
    }

    /// Terminal failure. Progress stays where the job stopped.
    pub fn fail(&mut self, status: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = JobState::Error;
        self.status_message = status.into();
        self.result_path = None;
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn status_view(&self, download_url_prefix: &str) -> JobStatusView {
        let download_url = match self.state {
            JobState::Completed => Some(format!(
                "{}/{}",
                download_url_prefix.trim_end_matches('/'),
                self.id
            )),
            _ => None,
        };
        JobStatusView {
            status: self.status_message.clone(),
            progress: self.progress,
            state: self.state,
            download_url,
        }
    }
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub status: String,
    pub progress: u8,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("job-1", "cover.docx", Position::Append, 2)
    }

    #[test]
    fn test_new_job_is_processing_without_result() {
        let job = job();
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.progress, 0);
        assert!(job.result_path.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = job();
        job.advance(50, "halfway");
        job.advance(10, "late report");
        assert_eq!(job.progress, 50);
        assert_eq!(job.status_message, "late report");
    }

    #[test]
    fn test_progress_100_only_on_completion() {
        let mut job = job();
        job.advance(100, "almost");
        assert_eq!(job.progress, 99);

        job.complete(PathBuf::from("/r/job-1.zip"), "done");
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut job = job();
        assert!(job.fail("conversion failed"));
        assert!(!job.complete(PathBuf::from("/r/x.zip"), "done"));
        assert!(!job.advance(60, "more"));
        job.record_success();

        assert_eq!(job.state, JobState::Error);
        assert_eq!(job.status_message, "conversion failed");
        assert!(job.result_path.is_none());
        assert_eq!(job.success_count, 0);

        let mut done = self::job();
        done.complete(PathBuf::from("/r/job-1.zip"), "done");
        assert!(!done.fail("late"));
        assert_eq!(done.state, JobState::Completed);
        assert!(done.result_path.is_some());
    }

    #[test]
    fn test_error_keeps_progress() {
        let mut job = job();
        job.advance(5, "Converting office document");
        job.fail("no converter");
        assert_eq!(job.progress, 5);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_counts() {
        let mut job = job();
        job.record_success();
        job.record_failure(FailedFile::new("b.pdf", "invalid"));
        assert_eq!(job.processed_count, 2);
        assert_eq!(job.success_count, 1);
        assert_eq!(job.failed_files, vec![FailedFile::new("b.pdf", "invalid")]);
    }

    #[test]
    fn test_status_view_download_url_only_when_completed() {
        let mut job = job();
        assert_eq!(job.status_view("/api/download").download_url, None);

        job.complete(PathBuf::from("/r/job-1.zip"), "Completed: 2/2 PDFs processed successfully");
        let view = job.status_view("/api/download/");
        assert_eq!(view.download_url.as_deref(), Some("/api/download/job-1"));
        assert_eq!(view.state, JobState::Completed);
        assert_eq!(view.progress, 100);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&JobState::Completed).unwrap(), "\"completed\"");
        assert_eq!(JobState::Error.to_string(), "error");
    }
}
