use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Upper bound on `_N` suffixes tried before giving up on a name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on same
/// filesystem). Falls back to copy + delete when rename fails, which covers
/// cross-device moves such as a converter writing into the system temp dir.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn split_name(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    }
}

fn numbered(filename: &str, counter: usize) -> String {
    if counter == 1 {
        return filename.to_string();
    }
    match split_name(filename) {
        (base, Some(ext)) => format!("{}_{}{}", base, counter, ext),
        (base, None) => format!("{}_{}", base, counter),
    }
}

/// Per-job locations inside the upload and result roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirs {
    /// Original inputs, owned by the submission step.
    pub upload_dir: PathBuf,
    /// Converted intermediate, per-file outputs and the report.
    pub result_dir: PathBuf,
    /// Final archive, named after the job id, next to the result directory.
    pub archive_path: PathBuf,
}

/// Ephemeral on-disk storage for jobs: one upload area and one result area
/// per job, both removed by [`WorkingStorage::remove_job`].
#[derive(Debug, Clone)]
pub struct WorkingStorage {
    upload_root: PathBuf,
    results_root: PathBuf,
}

impl WorkingStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_root: P, results_root: Q) -> Self {
        Self {
            upload_root: upload_root.as_ref().to_path_buf(),
            results_root: results_root.as_ref().to_path_buf(),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Paths for `job_id` without touching the filesystem.
    pub fn job_dirs(&self, job_id: &str) -> JobDirs {
        JobDirs {
            upload_dir: self.upload_root.join(job_id),
            result_dir: self.results_root.join(job_id),
            archive_path: self.results_root.join(format!("{}.zip", job_id)),
        }
    }

    /// Creates both per-job directories.
    pub fn prepare_job(&self, job_id: &str) -> Result<JobDirs, StorageError> {
        let dirs = self.job_dirs(job_id);
        ensure_directory(&dirs.upload_dir)?;
        ensure_directory(&dirs.result_dir)?;
        Ok(dirs)
    }

    /// Writes `content` under `directory` as `filename`, or `name_2.ext`,
    /// `name_3.ext`, ... when the name is taken. Creation uses `create_new`
    /// so two writers can never end up with the same file.
    pub fn store(
        &self,
        directory: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        ensure_directory(directory)?;

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let try_path = directory.join(numbered(filename, counter));

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::NameExhausted(filename.to_string()))
    }

    /// Removes everything a job left on disk. Missing paths are not an error.
    pub fn remove_job(&self, job_id: &str) -> Result<(), StorageError> {
        let dirs = self.job_dirs(job_id);
        remove_dir_if_exists(&dirs.upload_dir)?;
        remove_dir_if_exists(&dirs.result_dir)?;
        match std::fs::remove_file(&dirs.archive_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Remove {
                path: dirs.archive_path,
                source: e,
            }),
        }
    }
}

/// Returns a path in `directory` for `filename` that does not exist yet,
/// appending `_2`, `_3`, ... as needed.
///
/// Only a candidate: callers that race with other writers must use
/// [`WorkingStorage::store`] instead.
pub fn unused_path(directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    for counter in 1..=MAX_NAME_ATTEMPTS {
        let candidate = directory.join(numbered(filename, counter));
        // symlink_metadata also sees broken symlinks
        if std::fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }
    Err(StorageError::NameExhausted(filename.to_string()))
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

fn remove_dir_if_exists(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
