use std::io::{Read, Seek};
use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::converter::ConversionStrategy;
use crate::error::ConvertError;

const LINES_PER_PAGE: usize = 50;
const WRAP_COLUMNS: usize = 90;

/// Last-resort conversion without any external tool.
///
/// Reads the text of a DOCX package and lays it out as plain Helvetica pages.
/// Formatting, images and tables are lost; only the words survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxRenderer;

impl DocxRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionStrategy for DocxRenderer {
    fn name(&self) -> &'static str {
        "docx-renderer"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        let file = std::fs::File::open(source)
            .map_err(|e| ConvertError::Docx(format!("cannot open document: {}", e)))?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            ConvertError::UnsupportedDocument(format!("not an OOXML package: {}", e))
        })?;

        let text = extract_docx_text(&mut archive)?;
        let pdf_bytes = render_text_pdf(&text)?;

        std::fs::write(dest, pdf_bytes)
            .map_err(|e| ConvertError::Render(format!("cannot write output: {}", e)))
    }
}

fn extract_docx_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ConvertError> {
    let mut document_xml = archive.by_name("word/document.xml").map_err(|e| {
        ConvertError::UnsupportedDocument(format!("word/document.xml missing: {}", e))
    })?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| ConvertError::Docx(format!("cannot read document.xml: {}", e)))?;

    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<String, ConvertError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let decoded = e
                    .decode()
                    .map_err(|err| ConvertError::Docx(format!("bad text run: {}", err)))?;
                text.push_str(&decoded);
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                let name = e
                    .decode()
                    .map_err(|err| ConvertError::Docx(format!("bad entity: {}", err)))?;
                match e.resolve_char_ref() {
                    Ok(Some(c)) => text.push(c),
                    _ => match predefined_entity(&name) {
                        Some(c) => text.push(c),
                        None => log::debug!("Skipping unknown entity &{};", name),
                    },
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConvertError::Docx(format!("XML parsing error: {}", e))),
            _ => {}
        }
    }

    Ok(text)
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Breaks `text` into display lines no wider than [`WRAP_COLUMNS`],
/// preferring to break at spaces.
fn layout_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let expanded = paragraph.replace('\t', "    ");
        let mut current = String::new();
        for word in expanded.split(' ') {
            let mut word = word.to_string();
            // hard-split words that cannot fit on any line
            while word.chars().count() > WRAP_COLUMNS {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(WRAP_COLUMNS).collect();
                word = word.chars().skip(WRAP_COLUMNS).collect();
                lines.push(head);
            }
            let needed = current.chars().count() + word.chars().count() + 1;
            if !current.is_empty() && needed > WRAP_COLUMNS {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}

fn render_text_pdf(text: &str) -> Result<Vec<u8>, ConvertError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let lines = layout_lines(text);
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![lines.as_slice()]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut kids = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let content = page_content(chunk);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
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
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::Render(e.to_string()))?;
    Ok(buffer)
}

fn page_content(lines: &[String]) -> Vec<u8> {
    let mut content = b"BT\n/F1 11 Tf\n50 742 Td\n14 TL\n".to_vec();
    for line in lines {
        content.push(b'(');
        content.extend(encode_pdf_string(line));
        content.extend_from_slice(b") Tj T*\n");
    }
    content.extend_from_slice(b"ET\n");
    content
}

/// Encodes for a WinAnsi literal string. Latin-1 characters are written as
/// octal escapes; anything outside Latin-1 becomes `?`.
fn encode_pdf_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.extend(format!("\\{:03o}", c as u32).into_bytes()),
            c if c.is_control() => out.push(b' '),
            _ => out.push(b'?'),
        }
    }
    out
}
