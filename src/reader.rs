use std::path::Path;

use tracing::debug;

use crate::descriptor::{ColumnKind, Descriptor};
use crate::error::{ReleveError, Result};
use crate::models::{BankFormat, RawRow};

const SNIFF_LINES: usize = 10;
const CANDIDATE_DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm" | "xls" | "ods"))
        .unwrap_or(false)
}

/// Reads every row of a statement file, honouring the format's
/// `skip_rows`/`has_header` settings. Blank rows are dropped first and do
/// not count towards `skip_rows`.
pub fn read_rows(path: &Path, format: &BankFormat) -> Result<Vec<RawRow>> {
    let rows = if is_spreadsheet(path) {
        read_spreadsheet(path, format.sheet.as_deref(), &decimal_separators(&format.descriptor)?)?
    } else {
        let text = decode(&std::fs::read(path)?);
        read_delimited(&text, format.delimiter)?
    };
    let skip = format.skip_rows + usize::from(format.has_header);
    Ok(rows
        .into_iter()
        .filter(|r| r.cells.iter().any(|c| !c.trim().is_empty()))
        .skip(skip)
        .collect())
}

/// UTF-8 (with or without BOM), falling back to Windows-1252 which most
/// French banking portals still emit.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| windows_1252(b)).collect(),
    }
}

/// 0x80-0x9F are the only bytes where Windows-1252 departs from Latin-1.
/// The five holes (0x81, 0x8D, 0x8F, 0x90, 0x9D) pass through as C1 controls.
fn windows_1252(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        other => other as char,
    }
}

/// Forced decimal separator of each column, by position.
fn decimal_separators(descriptor: &str) -> Result<Vec<Option<char>>> {
    Ok(Descriptor::parse(descriptor)?
        .columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Number(sep) => sep,
            _ => None,
        })
        .collect())
}

/// Spreadsheet numbers come out with a `.` point; a column declared
/// `number(,)` gets a comma so the amount parser reads the same value.
#[cfg(feature = "xlsx")]
fn float_cell(f: f64, decimal: Option<char>) -> String {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return format!("{}", f as i64);
    }
    let text = f.to_string();
    match decimal {
        Some(',') => text.replace('.', ","),
        _ => text,
    }
}

/// Picks the candidate that splits the first lines into the same, largest
/// number of fields.
pub fn sniff_delimiter(text: &str) -> char {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let mut best = (';', 0usize, 0usize);
    for delim in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines.iter().map(|l| l.matches(delim).count()).collect();
        let Some(&max) = counts.iter().max() else { continue };
        if max == 0 {
            continue;
        }
        // Preamble lines may differ; count how many lines agree on the widest split.
        let agreeing = counts.iter().filter(|&&c| c == max).count();
        if (agreeing, max) > (best.1, best.2) {
            best = (delim, agreeing, max);
        }
    }
    best.0
}

pub fn read_delimited(text: &str, delimiter: Option<char>) -> Result<Vec<RawRow>> {
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(text));
    let mut delim_buf = [0u8; 4];
    let delim_bytes = delimiter.encode_utf8(&mut delim_buf).as_bytes();
    if delim_bytes.len() != 1 {
        return Err(ReleveError::Invalid(format!("delimiter '{delimiter}' must be a single byte")));
    }
    debug!(delimiter = %delimiter.escape_default(), "reading delimited file");

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delim_bytes[0])
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(rows.len() + 1, |p| p.line() as usize);
        rows.push(RawRow {
            line,
            cells: record.iter().map(|c| c.trim().to_string()).collect(),
        });
    }
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn read_spreadsheet(path: &Path, sheet: Option<&str>, separators: &[Option<char>]) -> Result<Vec<RawRow>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)?;
    let sheet_name = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReleveError::Invalid(format!("{} has no sheet", path.display())))?,
    };
    let range = workbook.worksheet_range(&sheet_name)?;
    let first_row = range.start().map_or(0, |(r, _)| r as usize);

    let mut rows = Vec::new();
    for (i, row) in range.rows().enumerate() {
        let cells = row
            .iter()
            .enumerate()
            .map(|(col, cell)| match cell {
                Data::Empty => String::new(),
                Data::String(s) => s.trim().to_string(),
                Data::Float(f) => float_cell(*f, separators.get(col).copied().flatten()),
                Data::Int(i) => i.to_string(),
                Data::Bool(b) => b.to_string(),
                Data::DateTime(dt) => crate::normalize::excel_serial_to_date(dt.as_f64())
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
                Data::Error(e) => format!("#{e:?}"),
            })
            .collect();
        rows.push(RawRow {
            line: first_row + i + 1,
            cells,
        });
    }
    Ok(rows)
}

#[cfg(not(feature = "xlsx"))]
fn read_spreadsheet(path: &Path, _sheet: Option<&str>, _separators: &[Option<char>]) -> Result<Vec<RawRow>> {
    Err(ReleveError::UnsupportedFile(format!(
        "{} (built without spreadsheet support)",
        path.display()
    )))
}
