use std::path::PathBuf;

use crate::pdf::Position;
use crate::storage::JobDirs;

/// File name of the converted office document inside the result area.
/// It is a working file and never goes into the archive.
pub const CONVERTED_DOCUMENT_NAME: &str = "converted_document.pdf";

/// Everything one pipeline run needs, fixed at submission time.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub document_path: PathBuf,
    /// Name shown in status text and in the report.
    pub document_name: String,
    /// Batch PDFs in submission order.
    pub pdf_paths: Vec<PathBuf>,
    pub position: Position,
    pub dirs: JobDirs,
}

impl JobContext {
    pub fn converted_path(&self) -> PathBuf {
        self.dirs.result_dir.join(CONVERTED_DOCUMENT_NAME)
    }

    pub fn total_files(&self) -> usize {
        self.pdf_paths.len()
    }
}
