use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_results_directory")]
    pub results_directory: String,
    /// Seconds a finished job (and its files) is kept before cleanup.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    /// Upper bound on jobs processed at once. `None` means unlimited.
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_download_url_prefix")]
    pub download_url_prefix: String,
    #[serde(default = "default_archive_download_name")]
    pub archive_download_name: String,
    #[serde(default)]
    pub converter: ConverterConfig,
}

fn default_upload_directory() -> String {
    std::env::temp_dir()
        .join("pdf_updater_uploads")
        .to_string_lossy()
        .into_owned()
}

fn default_results_directory() -> String {
    std::env::temp_dir()
        .join("pdf_updater_results")
        .to_string_lossy()
        .into_owned()
}

fn default_retention_seconds() -> u64 {
    3600
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_download_url_prefix() -> String {
    "/api/download".to_string()
}

fn default_archive_download_name() -> String {
    "pdf_updater_results.zip".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            results_directory: default_results_directory(),
            retention_seconds: default_retention_seconds(),
            max_concurrent_jobs: None,
            max_upload_bytes: default_max_upload_bytes(),
            download_url_prefix: default_download_url_prefix(),
            archive_download_name: default_archive_download_name(),
            converter: ConverterConfig::default(),
        }
    }
}

impl Config {
    pub fn upload_root(&self) -> PathBuf {
        PathBuf::from(&self.upload_directory)
    }

    pub fn results_root(&self) -> PathBuf {
        PathBuf::from(&self.results_directory)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Try the host's native office automation first (Windows / macOS only).
    #[serde(default = "default_true")]
    pub office_automation: bool,
    /// Headless office-suite executables, probed in order. Bare names are
    /// resolved through the search path.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Fall back to the built-in DOCX renderer when no external tool worked.
    #[serde(default = "default_true")]
    pub library_fallback: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    120
}

/// Well-known LibreOffice install locations for the current platform,
/// followed by names left to the search path.
pub fn default_candidates() -> Vec<String> {
    let mut candidates: Vec<String> = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\LibreOffice\program\soffice.exe".to_string(),
            r"C:\Program Files (x86)\LibreOffice\program\soffice.exe".to_string(),
        ]
    } else if cfg!(target_os = "macos") {
        vec!["/Applications/LibreOffice.app/Contents/MacOS/soffice".to_string()]
    } else {
        vec![
            "/usr/bin/soffice".to_string(),
            "/usr/bin/libreoffice".to_string(),
            "/usr/local/bin/soffice".to_string(),
            "/opt/libreoffice/program/soffice".to_string(),
            "/snap/bin/libreoffice".to_string(),
        ]
    };
    candidates.push("soffice".to_string());
    candidates.push("libreoffice".to_string());
    candidates
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            office_automation: true,
            candidates: default_candidates(),
            timeout_seconds: default_timeout_seconds(),
            library_fallback: true,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
