//! Builders for test configurations and documents.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;

use docmerge::config::{Config, ConverterConfig};
use docmerge::UploadedFile;
use lopdf::{dictionary, Document, Object, Stream};

/// Builder for `Config` instances rooted in a test directory.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Defaults for tests: no office automation, a headless candidate that
    /// cannot exist, and the built-in DOCX renderer as the working fallback.
    pub fn new(root: &Path) -> Self {
        Self {
            config: Config {
                upload_directory: root.join("uploads").to_string_lossy().into_owned(),
                results_directory: root.join("results").to_string_lossy().into_owned(),
                converter: ConverterConfig {
                    office_automation: false,
                    candidates: vec![root.join("no-office/soffice").to_string_lossy().into_owned()],
                    timeout_seconds: 30,
                    library_fallback: true,
                },
                ..Config::default()
            },
        }
    }

    pub fn retention_seconds(mut self, seconds: u64) -> Self {
        self.config.retention_seconds = seconds;
        self
    }

    pub fn max_concurrent_jobs(mut self, limit: usize) -> Self {
        self.config.max_concurrent_jobs = Some(limit);
        self
    }

    pub fn max_upload_bytes(mut self, limit: u64) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    /// Removes every working conversion strategy.
    pub fn without_converters(mut self) -> Self {
        self.config.converter.library_fallback = false;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// A minimal DOCX package whose body has one paragraph per entry.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        )
        .unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

/// One page per entry, each page showing its entry as text.
pub fn pdf_bytes(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in page_texts {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn pdf_upload(name: &str, page_texts: &[&str]) -> UploadedFile {
    UploadedFile::new(name, pdf_bytes(page_texts))
}

pub fn corrupt_upload(name: &str) -> UploadedFile {
    UploadedFile::new(name, b"%PDF-1.4\nthis is not really a pdf".to_vec())
}

pub fn docx_upload(name: &str, paragraphs: &[&str]) -> UploadedFile {
    UploadedFile::new(name, docx_bytes(paragraphs))
}

/// Entry names of a zip held in memory, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut content = Vec::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    content
}

/// Trimmed text of every page of an in-memory PDF.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .keys()
        .map(|n| doc.extract_text(&[*n]).unwrap().trim().to_string())
        .collect()
}
