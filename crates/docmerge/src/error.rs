use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocmergeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Source document not found: '{0}'")]
    SourceMissing(PathBuf),

    #[error("Strategy unavailable on this host")]
    Unavailable,

    #[error("No conversion tool found (probed: {probed})")]
    ToolNotFound { probed: String },

    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("'{program}' exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Expected output '{0}' was not produced")]
    MissingOutput(PathBuf),

    #[error("Failed to move converted file: {0}")]
    Relocate(#[from] StorageError),

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Failed to read DOCX: {0}")]
    Docx(String),

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error("All conversion strategies failed: {attempts}")]
    Exhausted { attempts: String },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to open '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Failed to combine documents: {0}")]
    Combine(String),

    #[error("Failed to save '{path}': {reason}")]
    Save { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for '{0}'")]
    NameExhausted(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to create archive '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan result directory '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error while writing archive: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Submission is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Job service is not running inside a tokio runtime")]
    NoRuntime,

    #[error("Storing the upload was interrupted: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Job '{0}' has no result yet")]
    NotReady(String),

    #[error("Result file for job '{0}' no longer exists")]
    Gone(String),

    #[error("Failed to read result file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// All variants except `Read` mean "nothing to download" to a caller.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, FetchError::Read { .. })
    }
}

pub type Result<T> = std::result::Result<T, DocmergeError>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umbrella_error_wraps_sources() {
        let err: DocmergeError = FetchError::NotReady("job-1".to_string()).into();
        assert_eq!(err.to_string(), "Fetch error: Job 'job-1' has no result yet");

        let err: DocmergeError = ConvertError::Exhausted {
            attempts: "headless-suite: missing".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Conversion error: All conversion strategies failed"));
    }

    #[test]
    fn test_fetch_error_not_found_classes() {
        assert!(FetchError::Gone("j".to_string()).is_not_found());
        let read = FetchError::Read {
            path: PathBuf::from("/r/j.zip"),
            source: std::io::Error::other("denied"),
        };
        assert!(!read.is_not_found());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
