use std::path::{Path, PathBuf};

use tracing::{info_span, warn};

use crate::archive::{ArchiveBuilder, Report};
use crate::config::ConverterConfig;
use crate::converter::DocumentConverter;
use crate::job::FailedFile;
use crate::pdf::{Integrity, IntegrityChecker, Merger, PdfMerger};
use crate::sanitize;
use crate::storage::unused_path;

use super::context::JobContext;
use super::error::{FileFailure, PipelineError};
use super::progress::{ProgressEvent, ProgressReporter};

const CONVERT_PROGRESS: u8 = 5;
const FILES_START_PROGRESS: u8 = 10;
const FILES_SPAN_PROGRESS: usize = 80;
const ARCHIVE_PROGRESS: u8 = 90;

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub archive_path: PathBuf,
    pub total_files: usize,
    pub success_count: usize,
    pub failed_files: Vec<FailedFile>,
    pub strategy: &'static str,
}

/// Runs one job: convert, merge into every batch file, archive.
pub struct Pipeline {
    converter: DocumentConverter,
    merger: Box<dyn Merger>,
    checker: IntegrityChecker,
    archiver: ArchiveBuilder,
}

impl Pipeline {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(DocumentConverter::from_config(config))
    }

    pub fn new(converter: DocumentConverter) -> Self {
        Self {
            converter,
            merger: Box::new(PdfMerger::new()),
            checker: IntegrityChecker::new(),
            archiver: ArchiveBuilder::new(),
        }
    }

    /// Replaces the default lopdf merger.
    pub fn with_merger(mut self, merger: impl Merger + 'static) -> Self {
        self.merger = Box::new(merger);
        self
    }

    /// Runs the job to a terminal event. The returned value mirrors what was
    /// reported: `Ok` after `Completed`, `Err` after `Failed`.
    pub fn run(
        &self,
        ctx: &JobContext,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError> {
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job_id,
            document = %ctx.document_name,
            position = %ctx.position,
            files = ctx.total_files(),
        )
        .entered();

        match self.execute(ctx, progress) {
            Ok(summary) => {
                let message = format!(
                    "Completed: {}/{} PDFs processed successfully",
                    summary.success_count, summary.total_files
                );
                log::info!("Job {} {}", ctx.job_id, message.to_lowercase());
                progress.report(ProgressEvent::Completed {
                    result_path: summary.archive_path.clone(),
                    message,
                });
                Ok(summary)
            }
            Err(e) => {
                log::error!("Job {} failed: {}", ctx.job_id, e);
                progress.report(ProgressEvent::Failed {
                    error: format!("Error: {}", e),
                });
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        ctx: &JobContext,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError> {
        std::fs::create_dir_all(&ctx.dirs.result_dir).map_err(|e| {
            crate::error::StorageError::CreateDirectory {
                path: ctx.dirs.result_dir.clone(),
                source: e,
            }
        })?;

        // Step 1+2: convert and confirm the conversion is usable
        let converted = ctx.converted_path();
        let strategy = {
            let _step = info_span!("convert_document").entered();
            progress.report(ProgressEvent::Step {
                progress: CONVERT_PROGRESS,
                message: format!("Converting {} to PDF...", ctx.document_name),
            });
            let conversion = self.converter.convert(&ctx.document_path, &converted)?;

            progress.report(ProgressEvent::Step {
                progress: CONVERT_PROGRESS,
                message: "Validating converted document...".to_string(),
            });
            match self.checker.check(&converted) {
                Integrity::Valid { pages } => {
                    log::debug!("Converted document has {} pages", pages);
                }
                Integrity::Invalid { reason } => {
                    return Err(PipelineError::InvalidConversion(reason));
                }
            }
            conversion.strategy
        };

        // Step 3: every batch file, no early abort
        let total = ctx.total_files();
        let mut success_count = 0;
        let mut failed_files = Vec::new();
        for (index, input) in ctx.pdf_paths.iter().enumerate() {
            let filename = display_name(input);
            let _step = info_span!("process_file", index, file = %filename).entered();
            progress.report(ProgressEvent::Step {
                progress: file_progress(index, total),
                message: format!("Processing {}/{}: {}", index + 1, total, filename),
            });

            match self.process_file(ctx, &converted, input, &filename) {
                Ok(()) => {
                    success_count += 1;
                    progress.report(ProgressEvent::FileSucceeded { filename });
                }
                Err(failure) => {
                    warn!(file = %filename, "{}", failure);
                    let failed = FailedFile::new(filename, failure.to_string());
                    failed_files.push(failed.clone());
                    progress.report(ProgressEvent::FileFailed { failed });
                }
            }
        }

        // Step 4: archive everything but the intermediate, plus the report
        {
            let _step = info_span!("build_archive").entered();
            progress.report(ProgressEvent::Step {
                progress: ARCHIVE_PROGRESS,
                message: "Creating archive...".to_string(),
            });
            let report = Report {
                document_name: ctx.document_name.clone(),
                position: ctx.position,
                total_files: total,
                success_count,
                failed_files: failed_files.clone(),
            };
            self.archiver.build(
                &ctx.dirs.result_dir,
                &ctx.dirs.archive_path,
                &[converted.as_path()],
                &report,
            )?;
        }

        Ok(RunSummary {
            archive_path: ctx.dirs.archive_path.clone(),
            total_files: total,
            success_count,
            failed_files,
            strategy,
        })
    }

    /// Validate input, merge, validate output. Leaves no output file behind
    /// on failure.
    fn process_file(
        &self,
        ctx: &JobContext,
        converted: &Path,
        input: &Path,
        filename: &str,
    ) -> Result<(), FileFailure> {
        if let Integrity::Invalid { reason } = self.checker.check(input) {
            return Err(FileFailure::InvalidInput(reason));
        }

        let output = unused_path(&ctx.dirs.result_dir, filename).map_err(FileFailure::Storage)?;

        if let Err(e) = self.merger.merge(input, converted, &output, ctx.position) {
            discard(&output);
            return Err(FileFailure::Merge(e));
        }

        match self.checker.check(&output) {
            Integrity::Valid { .. } => Ok(()),
            Integrity::Invalid { reason } => {
                discard(&output);
                Err(FileFailure::InvalidOutput(reason))
            }
        }
    }
}

/// 10 + floor(80 * index / total).
fn file_progress(index: usize, total: usize) -> u8 {
    if total == 0 {
        return FILES_START_PROGRESS;
    }
    let share = FILES_SPAN_PROGRESS * index.min(total) / total;
    FILES_START_PROGRESS.saturating_add(share as u8)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| sanitize::redact_path(path))
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", sanitize::redact_path(path), e);
        }
    }
}
