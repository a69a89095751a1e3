pub mod filesystem;

pub use filesystem::{move_file, unused_path, JobDirs, WorkingStorage};
