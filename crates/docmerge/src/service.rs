use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, Semaphore};

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::{validate_config, Config};
use crate::error::{panic_message, ConfigError, FetchError, StorageError, SubmitError};
use crate::job::{Job, JobRegistry, JobStatusView};
use crate::pdf::Position;
use crate::pipeline::{JobContext, Pipeline, ProgressEvent, ProgressReporter, RegistryProgress};
use crate::sanitize::{safe_filename, safe_filename_with_extension};
use crate::storage::{JobDirs, WorkingStorage};

/// One uploaded file: the client's name for it and its content.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Everything a client sends to start a job.
#[derive(Debug, Clone)]
pub struct Submission {
    pub document: UploadedFile,
    /// Batch PDFs, processed in this order.
    pub pdfs: Vec<UploadedFile>,
    /// `append`, `prepend` or `replace`; anything else means `append`.
    pub position: Option<String>,
}

impl Submission {
    pub fn total_bytes(&self) -> u64 {
        let pdfs: usize = self.pdfs.iter().map(|f| f.bytes.len()).sum();
        (self.document.bytes.len() + pdfs) as u64
    }
}

/// A finished job's archive, ready to hand to a client.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub bytes: Vec<u8>,
    pub download_name: String,
}

struct Inner {
    config: Config,
    storage: WorkingStorage,
    registry: JobRegistry,
    broadcaster: JobProgressBroadcaster,
    pipeline: Arc<Pipeline>,
    admission: Option<Arc<Semaphore>>,
}

/// Accepts submissions, runs each as an independent background task, and
/// answers polls and downloads. Cheap to clone.
///
/// Every job is removed, files and registry entry alike, once the retention
/// window has passed after it reached a terminal state.
#[derive(Clone)]
pub struct JobService {
    inner: Arc<Inner>,
}

impl JobService {
    /// Builds a service whose converter chain comes from `config.converter`.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let pipeline = Pipeline::from_config(&config.converter);
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: Config, pipeline: Pipeline) -> Result<Self, ConfigError> {
        validate_config(&config)?;

        let storage = WorkingStorage::new(config.upload_root(), config.results_root());
        let admission = config
            .max_concurrent_jobs
            .map(|limit| Arc::new(Semaphore::new(limit)));

        log::info!(
            "Job service ready (uploads: {}, results: {}, retention: {}s)",
            config.upload_directory,
            config.results_directory,
            config.retention_seconds
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                storage,
                registry: JobRegistry::new(),
                broadcaster: JobProgressBroadcaster::default(),
                pipeline: Arc::new(pipeline),
                admission,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Stores the inputs, registers the job and starts it in the background.
    /// Returns the job id.
    pub async fn submit(&self, submission: Submission) -> Result<String, SubmitError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SubmitError::NoRuntime)?;

        let size = submission.total_bytes();
        let limit = self.inner.config.max_upload_bytes;
        if size > limit {
            log::warn!("Rejected submission of {} bytes (limit {})", size, limit);
            return Err(SubmitError::TooLarge { size, limit });
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let position = Position::parse_or_default(submission.position.as_deref());

        // upload writes stay off the async workers
        let storage = self.inner.storage.clone();
        let id = job_id.clone();
        let stored =
            tokio::task::spawn_blocking(move || store_inputs(&storage, &id, submission, position))
                .await;
        let ctx = match stored {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(e)) => {
                remove_job(&self.inner, job_id).await;
                return Err(e.into());
            }
            Err(e) => {
                remove_job(&self.inner, job_id).await;
                return Err(SubmitError::Interrupted(e.to_string()));
            }
        };

        let job = Job::new(
            job_id.clone(),
            ctx.document_name.clone(),
            position,
            ctx.total_files(),
        );
        self.inner.broadcaster.send(JobProgressEvent::from_job(&job));
        self.inner.registry.register(job);
        log::info!(
            "Accepted job {} ({} PDFs, position {})",
            job_id,
            ctx.total_files(),
            position
        );

        let inner = Arc::clone(&self.inner);
        runtime.spawn(run_job(inner, ctx));

        Ok(job_id)
    }

    /// Current status, or `None` for unknown (or already cleaned up) jobs.
    pub fn poll(&self, job_id: &str) -> Option<JobStatusView> {
        self.inner
            .registry
            .get(job_id)
            .map(|job| job.status_view(&self.inner.config.download_url_prefix))
    }

    /// Full job record, including failed files.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.inner.registry.get(job_id)
    }

    /// Reads the finished archive of `job_id`.
    pub async fn fetch(&self, job_id: &str) -> Result<FetchedArchive, FetchError> {
        let job = self
            .inner
            .registry
            .get(job_id)
            .ok_or_else(|| FetchError::JobNotFound(job_id.to_string()))?;
        let path = job
            .result_path
            .ok_or_else(|| FetchError::NotReady(job_id.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedArchive {
                bytes,
                download_name: self.inner.config.archive_download_name.clone(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::Gone(job_id.to_string()))
            }
            Err(e) => Err(FetchError::Read { path, source: e }),
        }
    }

    /// Removes a terminal job right away instead of waiting for the retention
    /// window. Jobs still processing are left alone. Returns whether the job
    /// was removed.
    pub async fn purge(&self, job_id: &str) -> bool {
        match self.inner.registry.get(job_id) {
            Some(job) if job.is_terminal() => {}
            _ => return false,
        }
        remove_job(&self.inner, job_id.to_string()).await;
        true
    }
}

/// Writes the document and every PDF under the job's upload directory.
fn store_inputs(
    storage: &WorkingStorage,
    job_id: &str,
    submission: Submission,
    position: Position,
) -> Result<JobContext, StorageError> {
    let dirs: JobDirs = storage.prepare_job(job_id)?;

    let document_name =
        safe_filename(&submission.document.filename).unwrap_or_else(|| "document.docx".to_string());
    let document_path = storage.store(&dirs.upload_dir, &document_name, &submission.document.bytes)?;

    let mut pdf_paths: Vec<PathBuf> = Vec::with_capacity(submission.pdfs.len());
    for (index, pdf) in submission.pdfs.iter().enumerate() {
        let fallback = format!("file_{}", index + 1);
        let name = safe_filename_with_extension(&pdf.filename, &fallback, "pdf");
        pdf_paths.push(storage.store(&dirs.upload_dir, &name, &pdf.bytes)?);
    }

    Ok(JobContext {
        job_id: job_id.to_string(),
        document_path,
        document_name,
        pdf_paths,
        position,
        dirs,
    })
}

/// The job's background unit: wait for admission, run the blocking pipeline
/// off the async workers, then schedule cleanup whatever the outcome.
async fn run_job(inner: Arc<Inner>, ctx: JobContext) {
    let job_id = ctx.job_id.clone();

    let permit = match &inner.admission {
        Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => None,
        },
        None => None,
    };

    let pipeline = Arc::clone(&inner.pipeline);
    let progress = RegistryProgress::new(
        &job_id,
        inner.registry.clone(),
        inner.broadcaster.clone(),
    );
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&ctx, &progress)).await;

    if let Err(join_error) = outcome {
        let detail = if join_error.is_panic() {
            panic_message(join_error.into_panic().as_ref())
        } else {
            join_error.to_string()
        };
        log::error!("Job {} crashed: {}", job_id, detail);
        RegistryProgress::new(&job_id, inner.registry.clone(), inner.broadcaster.clone())
            .report(ProgressEvent::Failed {
                error: format!("Error: {}", detail),
            });
    }

    drop(permit);
    schedule_cleanup(inner, job_id);
}

/// Purges the job after the retention window, whether or not anyone
/// downloaded the result.
fn schedule_cleanup(inner: Arc<Inner>, job_id: String) {
    let retention = inner.config.retention();
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        remove_job(&inner, job_id).await;
    });
}

async fn remove_job(inner: &Inner, job_id: String) {
    let storage = inner.storage.clone();
    let id = job_id.clone();
    match tokio::task::spawn_blocking(move || storage.remove_job(&id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Cleanup of job {} incomplete: {}", job_id, e),
        Err(e) => log::warn!("Cleanup of job {} crashed: {}", job_id, e),
    }
    if inner.registry.delete(&job_id).is_some() {
        log::info!("Cleaned up job {}", job_id);
    }
}
