use std::path::Path;

use lopdf::Document;

use super::catch_parser_panic;

/// Outcome of opening a PDF and reading every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    Valid { pages: usize },
    Invalid { reason: String },
}

impl Integrity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Integrity::Valid { .. })
    }

    pub fn pages(&self) -> Option<usize> {
        match self {
            Integrity::Valid { pages } => Some(*pages),
            Integrity::Invalid { .. } => None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Integrity::Invalid {
            reason: reason.into(),
        }
    }
}

/// Confirms a PDF parses, has at least one page, and that every page's
/// dictionary and content streams can be read.
///
/// Never fails past its own boundary: every problem becomes
/// [`Integrity::Invalid`]. Reads the file fresh on every call, so checking the
/// same unmodified file twice gives the same answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, path: &Path) -> Integrity {
        let _span = tracing::debug_span!(
            "integrity_check",
            file = %crate::sanitize::redact_path(path)
        )
        .entered();

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return Integrity::invalid(format!("cannot read file: {}", e)),
        };

        match catch_parser_panic(|| inspect(&bytes)) {
            Ok(result) => result,
            Err(panic) => Integrity::invalid(format!("parser crashed: {}", panic)),
        }
    }
}

fn inspect(bytes: &[u8]) -> Integrity {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => return Integrity::invalid(format!("not a readable PDF: {}", e)),
    };

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Integrity::invalid("document has no pages");
    }

    for (number, page_id) in &pages {
        if let Err(e) = doc.get_dictionary(*page_id) {
            return Integrity::invalid(format!("page {} is unreadable: {}", number, e));
        }
        if let Err(e) = doc.get_page_content(*page_id) {
            return Integrity::invalid(format!("page {} content is unreadable: {}", number, e));
        }
    }

    Integrity::Valid { pages: pages.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::write_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_valid_pdf_reports_page_count() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_pdf(temp_dir.path(), "three.pdf", &["one", "two", "three"]);

        let result = IntegrityChecker::new().check(&path);

        assert_eq!(result, Integrity::Valid { pages: 3 });
        assert!(result.is_valid());
        assert_eq!(result.pages(), Some(3));
    }

    #[test]
    fn test_check_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_pdf(temp_dir.path(), "two.pdf", &["a", "b"]);
        let checker = IntegrityChecker::new();

        assert_eq!(checker.check(&path), checker.check(&path));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a valid pdf content").unwrap();

        match IntegrityChecker::new().check(&path) {
            Integrity::Invalid { reason } => {
                assert!(reason.contains("not a readable PDF"), "reason: {}", reason)
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_pdf_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let truncated = temp_dir.path().join("truncated.pdf");
        std::fs::write(&truncated, b"%PDF-1.5\n").unwrap();

        assert!(!IntegrityChecker::new().check(&truncated).is_valid());
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = IntegrityChecker::new().check(Path::new("/nonexistent/file.pdf"));

        match result {
            Integrity::Invalid { reason } => assert!(reason.contains("cannot read file")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_page_document_is_invalid() {
        use lopdf::{dictionary, Object};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.pdf");
        doc.save(&path).unwrap();

        match IntegrityChecker::new().check(&path) {
            Integrity::Invalid { reason } => assert!(reason.contains("no pages")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }
}
