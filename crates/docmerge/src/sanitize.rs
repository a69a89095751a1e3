//! Helpers for turning client-supplied names into safe file names and for
//! keeping full paths out of tracing span attributes.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static regex"))
}

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded filename to a flat, portable name.
///
/// - directory components (`/` or `\`) are dropped
/// - whitespace runs become a single `_`
/// - anything outside `[A-Za-z0-9_.-]` is removed
/// - leading/trailing `.` and `_` are trimmed, so `..` can never survive
///
/// Returns `None` when nothing usable is left.
pub fn safe_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = unsafe_chars().replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Like [`safe_filename`], but falls back to `fallback` and makes sure the
/// result carries `extension` (compared case-insensitively).
pub fn safe_filename_with_extension(name: &str, fallback: &str, extension: &str) -> String {
    let name = safe_filename(name).unwrap_or_else(|| fallback.to_string());
    let has_ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));

    if has_ext {
        name
    } else {
        format!("{}.{}", name, extension)
    }
}
