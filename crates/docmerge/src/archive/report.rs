use std::fmt::Write;

use crate::job::FailedFile;
use crate::pdf::Position;

pub const REPORT_FILE_NAME: &str = "report.txt";

const TITLE: &str = "PDF Update Report";

/// Plain-text summary packaged with every archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub document_name: String,
    pub position: Position,
    pub total_files: usize,
    pub success_count: usize,
    pub failed_files: Vec<FailedFile>,
}

impl Report {
    pub fn failed_count(&self) -> usize {
        self.failed_files.len()
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        // writing to a String cannot fail
        let _ = writeln!(output, "{}", TITLE);
        let _ = writeln!(output, "{}", "=".repeat(TITLE.len()));
        let _ = writeln!(output, "Document: {}", self.document_name);
        let _ = writeln!(output, "Position: {}", self.position);
        let _ = writeln!(output, "Total files: {}", self.total_files);
        let _ = writeln!(output, "Successful: {}", self.success_count);
        let _ = writeln!(output, "Failed: {}", self.failed_count());
        for failed in &self.failed_files {
            let _ = writeln!(output, "- {} ({})", failed.filename, failed.reason);
        }
        output
    }
}
