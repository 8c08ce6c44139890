//! Word-processor and presentation formats: DOCX, PPTX, ODT, ODP.
//!
//! All four are zip archives of XML. Text lives in `w:t` runs (WordprocessingML),
//! `a:t` runs (DrawingML), or `text:p` paragraphs (ODF); paragraph ends become
//! newlines so the chunker has boundaries to cut at.

use std::io::Read;

use quick_xml::events::Event;

use super::{Extracted, SourceMeta};
use crate::error::{PipelineError, Result};

/// Maximum decompressed bytes read from a single zip entry (zip-bomb bound).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub(super) type ZipBytes<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

pub(super) fn open_archive(bytes: &[u8]) -> Result<ZipBytes<'_>> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::Extraction(format!("ooxml: {e}")))
}

fn read_zip_entry_bounded(archive: &mut ZipBytes<'_>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| PipelineError::Extraction(format!("ooxml: {name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| PipelineError::Extraction(format!("ooxml: {name}: {e}")))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(PipelineError::Extraction(format!(
            "ooxml: zip entry {name} exceeds size limit"
        )));
    }
    Ok(out)
}

pub(super) fn extract_docx(bytes: &[u8]) -> Result<Extracted> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    let text = runs_with_paragraphs(&xml, b"t", b"p")?;
    let (meta, pages) = ooxml_props(&mut archive);
    Ok(Extracted {
        text,
        page_count: pages,
        meta,
        used_ocr: false,
    })
}

pub(super) fn extract_pptx(bytes: &[u8]) -> Result<Extracted> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let slide_count = slide_names.len() as i64;
    let mut out = String::new();
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        let text = runs_with_paragraphs(&xml, b"t", b"p")?;
        if !out.is_empty() && !text.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&text);
    }
    let (meta, _) = ooxml_props(&mut archive);
    Ok(Extracted {
        text: out,
        page_count: (slide_count > 0).then_some(slide_count),
        meta,
        used_ocr: false,
    })
}

pub(super) fn extract_odf(bytes: &[u8]) -> Result<Extracted> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "content.xml")?;
    let text = odf_text(&xml)?;
    let meta = odf_meta(&mut archive);
    Ok(Extracted {
        text,
        page_count: None,
        meta,
        used_ocr: false,
    })
}

/// Collect the text of `<run_tag>` elements, emitting a newline at the end
/// of each `<para_tag>`. Works for both `w:t`/`w:p` and `a:t`/`a:p`.
fn runs_with_paragraphs(xml: &[u8], run_tag: &[u8], para_tag: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == run_tag {
                    in_run = true;
                }
            }
            Ok(Event::Text(te)) if in_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == run_tag {
                    in_run = false;
                } else if name.as_ref() == para_tag {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PipelineError::Extraction(format!("ooxml: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// ODF body text: paragraph and heading contents, with explicit tab, space,
/// and line-break elements honored.
fn odf_text(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut para_depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" | b"h" => para_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) if para_depth > 0 => match e.local_name().as_ref() {
                b"tab" | b"s" => out.push(' '),
                b"line-break" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if para_depth > 0 => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" | b"h" => {
                    para_depth = para_depth.saturating_sub(1);
                    out.push('\n');
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(PipelineError::Extraction(format!("odf: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// OOXML document properties from docProps/core.xml and docProps/app.xml.
/// Missing entries and parse noise degrade to empty metadata.
pub(super) fn ooxml_props(archive: &mut ZipBytes<'_>) -> (SourceMeta, Option<i64>) {
    let mut meta = SourceMeta::default();
    let mut pages = None;

    if let Ok(xml) = read_zip_entry_bounded(archive, "docProps/core.xml") {
        meta.title = element_text(&xml, b"title");
        meta.author = element_text(&xml, b"creator");
        meta.created = element_text(&xml, b"created");
    }
    if let Ok(xml) = read_zip_entry_bounded(archive, "docProps/app.xml") {
        meta.company = element_text(&xml, b"Company");
        pages = element_text(&xml, b"Pages").and_then(|s| s.parse().ok());
    }
    (meta, pages)
}

/// ODF metadata from meta.xml.
pub(super) fn odf_meta(archive: &mut ZipBytes<'_>) -> SourceMeta {
    let xml = match read_zip_entry_bounded(archive, "meta.xml") {
        Ok(xml) => xml,
        Err(_) => return SourceMeta::default(),
    };
    SourceMeta {
        title: element_text(&xml, b"title"),
        author: element_text(&xml, b"creator"),
        created: element_text(&xml, b"creation-date"),
        company: None,
    }
}

/// First non-empty text content of the named element.
fn element_text(xml: &[u8], local: &[u8]) -> Option<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == local {
                    inside = true;
                }
            }
            Ok(Event::Text(te)) if inside => {
                let s = te.unescape().unwrap_or_default().trim().to_string();
                if !s.is_empty() {
                    return Some(s);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == local {
                    inside = false;
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
