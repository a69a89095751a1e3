pub mod report;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

pub use report::{Report, REPORT_FILE_NAME};

/// What ended up in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names in the order they were written, report last.
    pub entries: Vec<String>,
}

/// Packages a job's result area into one deflate-compressed zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Zips every file under `result_dir` except those in `exclude`, then
    /// writes the rendered report into `result_dir` and appends it to the
    /// archive.
    pub fn build(
        &self,
        result_dir: &Path,
        archive_path: &Path,
        exclude: &[&Path],
        report: &Report,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let _span = tracing::info_span!(
            "build_archive",
            archive = %crate::sanitize::redact_path(archive_path)
        )
        .entered();

        let report_path = result_dir.join(REPORT_FILE_NAME);
        let mut entries = self.write_results(result_dir, archive_path, exclude, &report_path)?;

        let rendered = report.render();
        std::fs::write(&report_path, &rendered).map_err(|e| ArchiveError::Create {
            path: report_path.clone(),
            source: e,
        })?;
        self.append_entry(archive_path, REPORT_FILE_NAME, rendered.as_bytes())?;
        entries.push(REPORT_FILE_NAME.to_string());

        log::info!("Archive written with {} entries", entries.len());
        Ok(ArchiveSummary {
            path: archive_path.to_path_buf(),
            entries,
        })
    }

    fn write_results(
        &self,
        result_dir: &Path,
        archive_path: &Path,
        exclude: &[&Path],
        report_path: &Path,
    ) -> Result<Vec<String>, ArchiveError> {
        let file = File::create(archive_path).map_err(|e| ArchiveError::Create {
            path: archive_path.to_path_buf(),
            source: e,
        })?;
        let mut zip = ZipWriter::new(file);
        let mut entries = Vec::new();

        let walker = WalkDir::new(result_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        for entry in walker {
            let entry = entry.map_err(|e| ArchiveError::Scan {
                path: result_dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path == archive_path
                || path == report_path
                || exclude.iter().any(|skip| *skip == path)
            {
                continue;
            }

            let name = entry_name(result_dir, path);
            let content = std::fs::read(path).map_err(|e| ArchiveError::ReadEntry {
                path: path.to_path_buf(),
                source: e,
            })?;
            zip.start_file(name.as_str(), options())?;
            zip.write_all(&content)?;
            entries.push(name);
        }

        zip.finish()?;
        Ok(entries)
    }

    fn append_entry(
        &self,
        archive_path: &Path,
        name: &str,
        content: &[u8],
    ) -> Result<(), ArchiveError> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(archive_path)
            .map_err(|e| ArchiveError::Create {
                path: archive_path.to_path_buf(),
                source: e,
            })?;
        let mut zip = ZipWriter::new_append(file)?;
        zip.start_file(name, options())?;
        zip.write_all(content)?;
        zip.finish()?;
        Ok(())
    }
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Archive entry name: path relative to the result area, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
