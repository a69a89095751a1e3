use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::converter::command::{require_success, run_with_timeout};
use crate::converter::ConversionStrategy;
use crate::error::ConvertError;

/// Word's `wdExportFormatPDF`.
const WD_EXPORT_FORMAT_PDF: u8 = 17;

/// Paths go to the scripts through the environment, never spliced into
/// script text.
const SOURCE_VAR: &str = "DOCMERGE_SRC";
const DEST_VAR: &str = "DOCMERGE_DEST";

/// Drives the word processor installed on the host: Word over COM on Windows,
/// Word over Apple Events on macOS. Unavailable everywhere else.
pub struct OfficeAutomation {
    timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    Windows,
    MacOs,
    Other,
}

impl Host {
    fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Host::Windows,
            "macos" => Host::MacOs,
            _ => Host::Other,
        }
    }
}

impl OfficeAutomation {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(host: Host, source: &Path, dest: &Path) -> Option<(String, Command)> {
        let (program, mut cmd) = match host {
            Host::Windows => {
                let mut cmd = Command::new("powershell");
                cmd.args([
                    "-NoProfile",
                    "-NonInteractive",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-Command",
                ])
                .arg(powershell_script());
                ("powershell", cmd)
            }
            Host::MacOs => {
                let mut cmd = Command::new("osascript");
                cmd.args(["-l", "JavaScript", "-e"]).arg(JXA_SCRIPT);
                ("osascript", cmd)
            }
            Host::Other => return None,
        };
        cmd.env(SOURCE_VAR, source).env(DEST_VAR, dest);
        Some((program.to_string(), cmd))
    }
}

fn powershell_script() -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $word = New-Object -ComObject Word.Application; \
         try {{ \
           $word.Visible = $false; \
           $word.DisplayAlerts = 0; \
           $doc = $word.Documents.Open($env:{src}, $false, $true); \
           try {{ $doc.ExportAsFixedFormat($env:{dest}, {format}) }} \
           finally {{ $doc.Close($false) }} \
         }} finally {{ $word.Quit() }}",
        src = SOURCE_VAR,
        dest = DEST_VAR,
        format = WD_EXPORT_FORMAT_PDF,
    )
}

const JXA_SCRIPT: &str = r#"
ObjC.import('stdlib');
const src = $.getenv('DOCMERGE_SRC');
const dest = $.getenv('DOCMERGE_DEST');
const word = Application('Microsoft Word');
word.open(Path(src));
const doc = word.activeDocument;
try {
  doc.saveAs({ fileName: dest, fileFormat: 'format PDF' });
} finally {
  doc.close({ saving: 'no' });
}
"#;

impl ConversionStrategy for OfficeAutomation {
    fn name(&self) -> &'static str {
        "office-automation"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        let Some((program, cmd)) = Self::command(Host::current(), source, dest) else {
            return Err(ConvertError::Unavailable);
        };
        let output = run_with_timeout(cmd, self.timeout)?;
        require_success(&program, output)?;
        Ok(())
    }
}
