pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use context::{JobContext, CONVERTED_DOCUMENT_NAME};
pub use error::{FileFailure, PipelineError};
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, RegistryProgress};
pub use runner::{Pipeline, RunSummary};
