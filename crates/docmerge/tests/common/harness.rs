//! Test harness for running jobs against an isolated service.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use docmerge::config::Config;
use docmerge::{
    ConversionStrategy, ConvertError, DocumentConverter, Job, JobService, Pipeline, Submission,
    UploadedFile,
};
use tempfile::TempDir;

use super::builders::{pdf_bytes, ConfigBuilder};

/// Converter strategy that ignores the document and writes a fixed PDF.
pub struct FixedPdf {
    pages: Vec<String>,
}

impl FixedPdf {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ConversionStrategy for FixedPdf {
    fn name(&self) -> &'static str {
        "fixed-pdf"
    }

    fn convert(&self, _source: &Path, dest: &Path) -> Result<(), ConvertError> {
        let pages: Vec<&str> = self.pages.iter().map(String::as_str).collect();
        std::fs::write(dest, pdf_bytes(&pages)).map_err(|e| ConvertError::Render(e.to_string()))
    }
}

/// Test harness owning a temporary upload/results area.
pub struct TestHarness {
    pub temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn upload_root(&self) -> PathBuf {
        self.root().join("uploads")
    }

    pub fn results_root(&self) -> PathBuf {
        self.root().join("results")
    }

    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.root())
    }

    /// Service whose document conversion always yields a one-page "COVER" PDF.
    pub fn service(&self) -> JobService {
        self.service_with_config(self.config().build())
    }

    pub fn service_with_config(&self, config: Config) -> JobService {
        let converter = DocumentConverter::new(vec![Box::new(FixedPdf::new(&["COVER"]))]);
        JobService::with_pipeline(config, Pipeline::new(converter))
            .expect("Failed to build service")
    }

    /// Service using the converter chain described by `config`.
    pub fn configured_service(&self, config: Config) -> JobService {
        JobService::new(config).expect("Failed to build service")
    }

    /// Polls until the job leaves the processing state.
    pub async fn wait_for_terminal(&self, service: &JobService, job_id: &str) -> Job {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            let job = service
                .job(job_id)
                .unwrap_or_else(|| panic!("Job {} vanished while waiting", job_id));
            if job.is_terminal() {
                return job;
            }
            assert!(Instant::now() < deadline, "Job {} did not finish in time", job_id);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Polls until the job is no longer known to the service.
    pub async fn wait_for_removal(&self, service: &JobService, job_id: &str) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while service.poll(job_id).is_some() {
            assert!(Instant::now() < deadline, "Job {} was never cleaned up", job_id);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

pub fn submission(document: UploadedFile, pdfs: Vec<UploadedFile>, position: &str) -> Submission {
    Submission {
        document,
        pdfs,
        position: Some(position.to_string()),
    }
}
