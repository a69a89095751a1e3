use thiserror::Error;

use crate::error::{ArchiveError, ConvertError, MergeError, StorageError};

/// Job-fatal failures. Any of these ends the job in the error state.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to convert office document: {0}")]
    Conversion(#[from] ConvertError),

    #[error("Converted document is not a valid PDF: {0}")]
    InvalidConversion(String),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to create archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Why one batch file was left out. Recorded, never job-fatal.
#[derive(Error, Debug)]
pub enum FileFailure {
    #[error("invalid input PDF: {0}")]
    InvalidInput(String),

    #[error("merge failed: {0}")]
    Merge(#[source] MergeError),

    #[error("merged output invalid: {0}")]
    InvalidOutput(String),

    #[error("could not place output: {0}")]
    Storage(#[source] StorageError),
}
