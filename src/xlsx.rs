use crate::clock::LocalClock;
use crate::model::parse_ts;
use crate::reports::DetailedRow;
use anyhow::Context;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const LATE_SHEET_NAME: &str = "Late arrivals";
pub const LATE_HEADERS: [&str; 4] = ["Student", "Grade", "Date and time", "Reason"];
pub const COLUMN_WIDTH: f64 = 28.0;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

/// A single-sheet table of text cells.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_width: f64,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub file_name: String,
    pub row_count: usize,
}

pub fn export_filename(from: NaiveDate, to: NaiveDate) -> String {
    format!("late_arrivals_{}_to_{}.xlsx", from, to)
}

pub fn late_arrivals_sheet(rows: &[DetailedRow], clock: &LocalClock) -> Sheet {
    Sheet {
        name: LATE_SHEET_NAME.to_string(),
        headers: LATE_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| {
                let when = parse_ts(&r.reported_at)
                    .map(|ts| clock.local_display(ts))
                    .unwrap_or_else(|| r.reported_at.clone());
                vec![r.student_display(), r.grade_display(), when, r.reason.clone()]
            })
            .collect(),
        column_width: COLUMN_WIDTH,
    }
}

pub fn render_late_arrivals(rows: &[DetailedRow], clock: &LocalClock) -> anyhow::Result<Vec<u8>> {
    render(&late_arrivals_sheet(rows, clock))
}

/// Writes the workbook as `<out_dir>/late_arrivals_<from>_to_<to>.xlsx`.
pub fn write_late_arrivals(
    out_dir: &Path,
    from: NaiveDate,
    to: NaiveDate,
    rows: &[DetailedRow],
    clock: &LocalClock,
) -> anyhow::Result<ExportSummary> {
    let bytes = render_late_arrivals(rows, clock)?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;
    let file_name = export_filename(from, to);
    let path = out_dir.join(&file_name);
    let mut f = File::create(&path)
        .with_context(|| format!("failed to create output file {}", path.to_string_lossy()))?;
    f.write_all(&bytes)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(ExportSummary {
        path,
        file_name,
        row_count: rows.len(),
    })
}

pub fn render(sheet: &Sheet) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", content_types()),
        ("_rels/.rels", root_rels()),
        ("xl/workbook.xml", workbook(&sheet.name)),
        ("xl/_rels/workbook.xml.rels", workbook_rels()),
        ("xl/styles.xml", styles()),
        ("xl/worksheets/sheet1.xml", worksheet(sheet)),
    ];
    for (name, body) in parts {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name}"))?;
    }

    let cursor = zip.finish().context("failed to finalize workbook")?;
    Ok(cursor.into_inner())
}

fn content_types() -> String {
    format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
</Types>"
    )
}

fn root_rels() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">\
<Relationship Id=\"rId1\" Type=\"{NS_REL}/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>"
    )
}

fn workbook(sheet_name: &str) -> String {
    format!(
        "{XML_DECL}<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_REL}\">\
<sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets>\
</workbook>",
        escape_xml(sheet_name)
    )
}

fn workbook_rels() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">\
<Relationship Id=\"rId1\" Type=\"{NS_REL}/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{NS_REL}/styles\" Target=\"styles.xml\"/>\
</Relationships>"
    )
}

fn styles() -> String {
    format!(
        "{XML_DECL}<styleSheet xmlns=\"{NS_MAIN}\">\
<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill><fill><patternFill patternType=\"gray125\"/></fill></fills>\
<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\
<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
<cellXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/></cellXfs>\
<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
</styleSheet>"
    )
}

fn worksheet(sheet: &Sheet) -> String {
    let ncols = sheet
        .rows
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(sheet.headers.len()))
        .max()
        .unwrap_or(0)
        .max(1);

    let mut out = String::new();
    out.push_str(XML_DECL);
    out.push_str(&format!("<worksheet xmlns=\"{NS_MAIN}\">"));
    out.push_str(&format!(
        "<cols><col min=\"1\" max=\"{}\" width=\"{}\" customWidth=\"1\"/></cols>",
        ncols, sheet.column_width
    ));
    out.push_str("<sheetData>");
    for (i, cells) in std::iter::once(&sheet.headers)
        .chain(sheet.rows.iter())
        .enumerate()
    {
        let r = i + 1;
        out.push_str(&format!("<row r=\"{}\">", r));
        for (c, text) in cells.iter().enumerate() {
            out.push_str(&format!(
                "<c r=\"{}{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                column_letter(c),
                r,
                escape_xml(text)
            ));
        }
        out.push_str("</row>");
    }
    out.push_str("</sheetData></worksheet>");
    out
}

/// Zero-based column index to its spreadsheet letter (0 -> A, 26 -> AA).
fn column_letter(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Escapes markup characters and drops control characters XML 1.0 forbids.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}
