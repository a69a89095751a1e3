use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use crate::converter::command::{require_success, run_with_timeout};
use crate::converter::ConversionStrategy;
use crate::error::ConvertError;
use crate::storage::move_file;

/// A version query should answer quickly; a hung probe counts as "not found".
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Converts through a headless office suite (LibreOffice `soffice`).
///
/// Candidates are probed in order with `--version`; the first one that
/// answers is adopted for the lifetime of this strategy. Candidates that
/// look like paths but do not exist are skipped without launching anything.
pub struct HeadlessSuite {
    candidates: Vec<String>,
    timeout: Duration,
    resolved: OnceLock<Option<String>>,
}

impl HeadlessSuite {
    pub fn new(candidates: Vec<String>, timeout: Duration) -> Self {
        Self {
            candidates,
            timeout,
            resolved: OnceLock::new(),
        }
    }

    /// The executable in use, probing on first call.
    pub fn executable(&self) -> Option<&str> {
        self.resolved
            .get_or_init(|| {
                let found = self.candidates.iter().find(|c| probe(c)).cloned();
                match &found {
                    Some(exe) => log::info!("Using headless office suite at {}", exe),
                    None => log::debug!(
                        "No headless office suite among {} candidates",
                        self.candidates.len()
                    ),
                }
                found
            })
            .as_deref()
    }

    fn run(&self, exe: &str, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        let dest_dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // Private output and profile directories keep concurrent conversions
        // from clobbering each other's files or fighting over the profile lock.
        let work_dir = dest_dir.join(format!(".soffice-{}", uuid::Uuid::new_v4()));
        let out_dir = work_dir.join("out");
        let profile_dir = work_dir.join("profile");
        std::fs::create_dir_all(&out_dir).map_err(|e| ConvertError::Launch {
            program: exe.to_string(),
            source: e,
        })?;

        let result = self.invoke(exe, source, &out_dir, &profile_dir, dest);
        let _ = std::fs::remove_dir_all(&work_dir);
        result
    }

    fn invoke(
        &self,
        exe: &str,
        source: &Path,
        out_dir: &Path,
        profile_dir: &Path,
        dest: &Path,
    ) -> Result<(), ConvertError> {
        let mut cmd = Command::new(exe);
        cmd.arg(format!("-env:UserInstallation={}", file_url(profile_dir)))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(source);

        let output = run_with_timeout(cmd, self.timeout)?;
        require_success(exe, output)?;

        let produced = produced_path(out_dir, source);
        if !produced.is_file() {
            return Err(ConvertError::MissingOutput(produced));
        }
        if produced != dest {
            move_file(&produced, dest)?;
        }
        Ok(())
    }
}

impl ConversionStrategy for HeadlessSuite {
    fn name(&self) -> &'static str {
        "headless-suite"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        let exe = self
            .executable()
            .ok_or_else(|| ConvertError::ToolNotFound {
                probed: self.candidates.join(", "),
            })?
            .to_string();
        self.run(&exe, source, dest)
    }
}

/// The suite names its output after the input's base name plus `.pdf`.
fn produced_path(out_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{}.pdf", stem))
}

fn looks_like_path(candidate: &str) -> bool {
    candidate.contains('/') || candidate.contains('\\')
}

/// True when `candidate` runs and answers a version query successfully.
fn probe(candidate: &str) -> bool {
    if looks_like_path(candidate) && !Path::new(candidate).is_file() {
        return false;
    }

    let mut cmd = Command::new(candidate);
    cmd.arg("--version");
    match run_with_timeout(cmd, PROBE_TIMEOUT) {
        Ok(output) if output.success() => true,
        Ok(output) => {
            log::debug!("Probe of {} exited with {}", candidate, output.status);
            false
        }
        Err(e) => {
            log::debug!("Probe of {} failed: {}", candidate, e);
            false
        }
    }
}

fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{}", text)
    } else {
        format!("file:///{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produced_path_uses_stem() {
        let path = produced_path(Path::new("/out"), Path::new("/in/Quarterly Report.docx"));
        assert_eq!(path, PathBuf::from("/out/Quarterly Report.pdf"));
    }

    #[test]
    fn test_missing_paths_are_not_found_without_error() {
        let suite = HeadlessSuite::new(
            vec![
                "/nonexistent/soffice".to_string(),
                r"C:\nowhere\soffice.exe".to_string(),
            ],
            Duration::from_secs(5),
        );

        assert!(suite.executable().is_none());
    }

    #[test]
    fn test_unknown_bare_name_is_not_found() {
        let suite = HeadlessSuite::new(
            vec!["docmerge-no-such-office-suite".to_string()],
            Duration::from_secs(5),
        );

        let temp = tempfile::TempDir::new().unwrap();
        let result = suite.convert(
            &temp.path().join("in.docx"),
            &temp.path().join("out.pdf"),
        );

        match result {
            Err(ConvertError::ToolNotFound { probed }) => {
                assert!(probed.contains("docmerge-no-such-office-suite"))
            }
            other => panic!("Expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_candidate_list() {
        let suite = HeadlessSuite::new(vec![], Duration::from_secs(5));
        assert!(suite.executable().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_suite_output_is_moved_to_destination() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        // Mimics soffice: answers --version, and for a conversion writes
        // <outdir>/<stem>.pdf by copying the input.
        let script = temp.path().join("fake-soffice");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo 'FakeOffice 1.0'; exit 0; fi\n\
             while [ $# -gt 1 ]; do\n\
               if [ \"$1\" = \"--outdir\" ]; then out=\"$2\"; fi\n\
               shift\n\
             done\n\
             src=\"$1\"\n\
             name=$(basename \"$src\")\n\
             cp \"$src\" \"$out/${name%.*}.pdf\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = temp.path().join("letter.docx");
        std::fs::write(&source, b"%PDF-fake").unwrap();
        let dest = temp.path().join("results").join("converted.pdf");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();

        let suite = HeadlessSuite::new(
            vec![script.to_string_lossy().into_owned()],
            Duration::from_secs(10),
        );
        suite.convert(&source, &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-fake");
        // only the destination is left behind
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url_unix() {
        assert_eq!(file_url(Path::new("/tmp/profile")), "file:///tmp/profile");
    }
}
