use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

use super::catch_parser_panic;

/// Page attributes a page may inherit from its ancestors in the page tree.
/// They are copied onto the page itself before the old tree is dropped.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against malformed (cyclic) page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Where the converted document's pages go relative to a target PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Target pages, then the converted document's pages.
    #[default]
    Append,
    /// The converted document's pages, then the target pages.
    Prepend,
    /// Only the converted document's pages.
    Replace,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Append => "append",
            Position::Prepend => "prepend",
            Position::Replace => "replace",
        }
    }

    /// Missing or unrecognized values fall back to [`Position::Append`].
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            None => Position::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Unknown position '{}', using append", raw);
                Position::default()
            }),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Position::Append),
            "prepend" => Ok(Position::Prepend),
            "replace" => Ok(Position::Replace),
            other => Err(format!(
                "unknown position '{}' (expected append, prepend or replace)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub pages: usize,
}

/// Combines a base PDF with an overlay PDF.
///
/// Stateless: calls share nothing, so one merger can serve any number of
/// files. Output is pruned, renumbered and stream-compressed on save so that
/// repeated merges do not accumulate dead objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfMerger;

impl PdfMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(
        &self,
        base: &Path,
        overlay: &Path,
        dest: &Path,
        position: Position,
    ) -> Result<MergeSummary, MergeError> {
        let _span = tracing::debug_span!(
            "merge",
            base = %crate::sanitize::redact_path(base),
            position = %position
        )
        .entered();

        catch_parser_panic(|| merge_documents(base, overlay, dest, position))
            .map_err(|panic| MergeError::Combine(format!("PDF library crashed: {}", panic)))?
    }
}

/// Anything that can write the merge of two PDFs to a destination.
pub trait Merger: Send + Sync {
    fn merge(
        &self,
        base: &Path,
        overlay: &Path,
        dest: &Path,
        position: Position,
    ) -> Result<MergeSummary, MergeError>;
}

impl Merger for PdfMerger {
    fn merge(
        &self,
        base: &Path,
        overlay: &Path,
        dest: &Path,
        position: Position,
    ) -> Result<MergeSummary, MergeError> {
        PdfMerger::merge(self, base, overlay, dest, position)
    }
}

fn merge_documents(
    base: &Path,
    overlay: &Path,
    dest: &Path,
    position: Position,
) -> Result<MergeSummary, MergeError> {
    let mut merged = match position {
        Position::Append => combine(vec![open(base)?, open(overlay)?])?,
        Position::Prepend => combine(vec![open(overlay)?, open(base)?])?,
        Position::Replace => open(overlay)?,
    };

    let pages = merged.get_pages().len();
    save_compacted(&mut merged, dest)?;
    Ok(MergeSummary { pages })
}

fn open(path: &Path) -> Result<Document, MergeError> {
    Document::load(path).map_err(|e| MergeError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Builds one document holding every page of `sources`, in order.
///
/// Each source is renumbered into its own id range, its pages are flattened
/// (inherited attributes copied down) and re-parented under a fresh page
/// tree. Catalogs, page-tree nodes and outlines of the sources are dropped;
/// everything else (fonts, images, content streams) is carried over.
fn combine(sources: Vec<Document>) -> Result<Document, MergeError> {
    let version = sources
        .first()
        .map(|d| d.version.clone())
        .unwrap_or_else(|| "1.5".to_string());
    let mut merged = Document::with_version(version);
    let mut next_id: u32 = 1;
    let mut page_order: Vec<ObjectId> = Vec::new();

    for mut doc in sources {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let mut page_ids = HashSet::new();
        for page_id in doc.get_pages().into_values() {
            let page = flatten_page(&doc, page_id)?;
            merged.objects.insert(page_id, Object::Dictionary(page));
            page_ids.insert(page_id);
            page_order.push(page_id);
        }

        for (object_id, object) in doc.objects {
            if page_ids.contains(&object_id) {
                continue;
            }
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }
    }

    if page_order.is_empty() {
        return Err(MergeError::Combine("no pages to combine".to_string()));
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();

    for page_id in &page_order {
        if let Some(Object::Dictionary(page)) = merged.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let kids: Vec<Object> = page_order.iter().map(|id| Object::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_order.len() as i64,
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    Ok(merged)
}

fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, MergeError> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| MergeError::Combine(format!("page {:?} unreadable: {}", page_id, e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(page)
}

fn save_compacted(doc: &mut Document, dest: &Path) -> Result<(), MergeError> {
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    doc.save(dest).map(|_| ()).map_err(|e| MergeError::Save {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    })
}
