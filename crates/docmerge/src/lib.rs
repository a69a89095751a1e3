pub mod archive;
pub mod broadcast;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod pdf;
pub mod pipeline;
pub mod sanitize;
pub mod service;
pub mod storage;

pub use archive::{ArchiveBuilder, Report};
pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, load_config_from_str, Config, ConverterConfig};
pub use converter::{ConversionStrategy, DocumentConverter};
pub use error::{
    ArchiveError, ConfigError, ConvertError, DocmergeError, FetchError, MergeError, Result,
    StorageError, SubmitError,
};
pub use job::{FailedFile, Job, JobRegistry, JobState, JobStatusView};
pub use pdf::{Integrity, IntegrityChecker, MergeSummary, Merger, PdfMerger, Position};
pub use pipeline::{Pipeline, PipelineError};
pub use service::{FetchedArchive, JobService, Submission, UploadedFile};
