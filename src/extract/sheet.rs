//! Spreadsheet formats: XLSX, XLS, ODS.
//!
//! Each sheet is serialized as a pipe-delimited table under a `== name ==`
//! header, so downstream chunks keep their sheet context. Workbook
//! properties come from the container (docProps for OOXML, meta.xml for
//! ODF) since calamine only exposes cell data.

use std::io::{Cursor, Read, Seek};

use calamine::{DataType, Ods, Reader as CalamineReader, Xls, Xlsx};

use super::office;
use super::{Extracted, SourceMeta};
use crate::error::{PipelineError, Result};

pub(super) fn extract_xlsx(bytes: &[u8]) -> Result<Extracted> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Extraction(format!("xlsx: {e}")))?;
    let (text, sheet_count) = serialize_workbook(&mut workbook);
    let meta = match office::open_archive(bytes) {
        Ok(mut archive) => office::ooxml_props(&mut archive).0,
        Err(_) => SourceMeta::default(),
    };
    Ok(Extracted {
        text,
        page_count: (sheet_count > 0).then_some(sheet_count),
        meta,
        used_ocr: false,
    })
}

pub(super) fn extract_xls(bytes: &[u8]) -> Result<Extracted> {
    let mut workbook = Xls::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Extraction(format!("xls: {e}")))?;
    let (text, sheet_count) = serialize_workbook(&mut workbook);
    Ok(Extracted {
        text,
        page_count: (sheet_count > 0).then_some(sheet_count),
        meta: SourceMeta::default(),
        used_ocr: false,
    })
}

pub(super) fn extract_ods(bytes: &[u8]) -> Result<Extracted> {
    let mut workbook = Ods::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Extraction(format!("ods: {e}")))?;
    let (text, sheet_count) = serialize_workbook(&mut workbook);
    let meta = match office::open_archive(bytes) {
        Ok(mut archive) => office::odf_meta(&mut archive),
        Err(_) => SourceMeta::default(),
    };
    Ok(Extracted {
        text,
        page_count: (sheet_count > 0).then_some(sheet_count),
        meta,
        used_ocr: false,
    })
}

/// All sheets as named pipe tables. Returns the text and the workbook's
/// total sheet count (including sheets that serialized to nothing).
fn serialize_workbook<RS: Read + Seek, R: CalamineReader<RS>>(workbook: &mut R) -> (String, i64) {
    let sheet_names = workbook.sheet_names().to_owned();
    let sheet_count = sheet_names.len() as i64;
    let mut out = String::new();
    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Some(Ok(range)) => range,
            _ => continue,
        };
        let table = serialize_range(&range);
        if table.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("== ");
        out.push_str(name);
        out.push_str(" ==\n");
        out.push_str(&table);
    }
    (out, sheet_count)
}

fn serialize_range(range: &calamine::Range<DataType>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for row in range.rows() {
        let mut cells: Vec<String> = row.iter().map(cell_text).collect();
        while cells.last().map_or(false, |c| c.is_empty()) {
            cells.pop();
        }
        if cells.is_empty() {
            continue;
        }
        lines.push(cells.join(" | "));
    }
    lines.join("\n")
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(v) => v.to_string(),
        DataType::Int(v) => v.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(v) => v.to_string(),
        DataType::DateTimeIso(s) => s.clone(),
        DataType::Duration(v) => v.to_string(),
        DataType::DurationIso(s) => s.clone(),
        DataType::Error(_) | DataType::Empty => String::new(),
    }
}
