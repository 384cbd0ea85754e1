//! Upload parsing: raw file bytes into an untrusted in-memory table.
//!
//! Callers hand the pipeline a named byte stream; nothing here touches the
//! file system. Delimited text goes through delimiter probing and an
//! encoding fallback (UTF-8, then Windows-1252, matching what the exporting
//! procurement systems actually emit). Excel workbooks go through calamine
//! with typed cells rendered back to strings.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::debug;

/// Bare file name for labeling an upload; falls back to the full path.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One user-supplied file: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> UploadFile {
        UploadFile {
            name: name.into(),
            bytes,
        }
    }

    fn is_workbook(&self) -> bool {
        let lowered = self.name.to_ascii_lowercase();
        lowered.ends_with(".xlsx") || lowered.ends_with(".xls")
    }
}

/// Parsed table with trimmed header names and rows padded to header width.
/// Columns and cell contents are untrusted and heterogeneous across files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];

/// Parses an upload into a [`RawUpload`], choosing the workbook or delimited
/// path from the file extension. A forced `delimiter` skips probing and is
/// ignored for workbooks.
pub fn parse_upload(file: &UploadFile, delimiter: Option<u8>) -> Result<RawUpload> {
    if file.bytes.is_empty() {
        bail!("File '{}' is empty", file.name);
    }
    let (headers, rows) = if file.is_workbook() {
        parse_workbook(file)?
    } else {
        parse_delimited(file, delimiter)?
    };
    finish(&file.name, headers, rows)
}

fn decode_upload_bytes(name: &str, bytes: &[u8]) -> Result<String> {
    const CANDIDATES: [&Encoding; 2] = [UTF_8, WINDOWS_1252];
    for encoding in CANDIDATES {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            if encoding != UTF_8 {
                debug!("'{name}' decoded as {}", encoding.name());
            }
            return Ok(text.into_owned());
        }
    }
    Err(anyhow!(
        "Failed to decode '{name}' as UTF-8 or Windows-1252"
    ))
}

/// First candidate delimiter that splits the header row into at least two
/// columns wins; files with a single column fall back to comma.
fn probe_delimiter(text: &str) -> u8 {
    let header_line = text.lines().next().unwrap_or("");
    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .find(|&candidate| header_line.contains(candidate as char))
        .unwrap_or(b',')
}

fn parse_delimited(
    file: &UploadFile,
    forced_delimiter: Option<u8>,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let text = decode_upload_bytes(&file.name, &file.bytes)?;
    let delimiter = forced_delimiter.unwrap_or_else(|| probe_delimiter(&text));
    debug!(
        "'{}' parsed as delimited text with {:?} separator",
        file.name, delimiter as char
    );

    // Spreadsheet exports are routinely ragged, so width enforcement happens
    // after parsing rather than in the reader.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Reading header row of '{}'", file.name))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (ordinal, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Reading row {} of '{}'", ordinal + 2, file.name))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok((headers, rows))
}

fn parse_workbook(file: &UploadFile) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let cursor = Cursor::new(file.bytes.as_slice());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .with_context(|| format!("Opening workbook '{}'", file.name))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| anyhow!("Workbook '{}' has no worksheets", file.name))?;
    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("Reading worksheet '{sheet_name}' of '{}'", file.name))?;
    debug!(
        "'{}' worksheet '{sheet_name}' spans {:?}",
        file.name,
        range.get_size()
    );

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(first) => first
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => bail!("Worksheet '{sheet_name}' of '{}' is empty", file.name),
    };
    let rows = row_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok((headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        // Date cells come back in a form the normalizer's datetime formats
        // parse.
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}

fn finish(
    file_name: &str,
    headers: Vec<String>,
    mut rows: Vec<Vec<String>>,
) -> Result<RawUpload> {
    if headers.iter().all(|h| h.is_empty()) {
        bail!("File '{file_name}' has no header row");
    }

    let width = headers.len();
    for row in &mut rows {
        row.resize(width, String::new());
    }

    // Columns with neither a name nor any data are export artifacts.
    let keep: Vec<usize> = (0..width)
        .filter(|&idx| {
            !headers[idx].is_empty() || rows.iter().any(|row| !row[idx].trim().is_empty())
        })
        .collect();

    if keep.len() == width {
        return Ok(RawUpload {
            file_name: file_name.to_string(),
            headers,
            rows,
        });
    }

    debug!(
        "Dropping {} blank column(s) from '{file_name}'",
        width - keep.len()
    );
    let headers = keep.iter().map(|&idx| headers[idx].clone()).collect();
    let rows = rows
        .into_iter()
        .map(|row| keep.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Ok(RawUpload {
        file_name: file_name.to_string(),
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, contents: &str) -> UploadFile {
        UploadFile::new(name, contents.as_bytes().to_vec())
    }

    #[test]
    fn parses_comma_delimited_text_with_trimmed_headers() {
        let parsed = parse_upload(
            &upload("spend.csv", " Supplier: Name , Net Amount \nAcme,12.50\n"),
            None,
        )
        .unwrap();
        assert_eq!(parsed.headers, vec!["Supplier: Name", "Net Amount"]);
        assert_eq!(parsed.rows, vec![vec!["Acme".to_string(), "12.50".into()]]);
    }

    #[test]
    fn probes_alternative_delimiters_in_order() {
        let semicolon =
            parse_upload(&upload("a.csv", "Supplier;Amount\nAcme;1\n"), None).unwrap();
        assert_eq!(semicolon.headers, vec!["Supplier", "Amount"]);

        let tab = parse_upload(&upload("b.txt", "Supplier\tAmount\nAcme\t1\n"), None).unwrap();
        assert_eq!(tab.headers, vec!["Supplier", "Amount"]);

        let pipe = parse_upload(&upload("c.csv", "Supplier|Amount\nAcme|1\n"), None).unwrap();
        assert_eq!(pipe.headers, vec!["Supplier", "Amount"]);
    }

    #[test]
    fn forced_delimiter_overrides_probing() {
        // The header contains a comma, so probing alone would split on it.
        let parsed = parse_upload(
            &upload("odd.csv", "Supplier, Inc;Amount\nAcme, Inc;1\n"),
            Some(b';'),
        )
        .unwrap();
        assert_eq!(parsed.headers, vec!["Supplier, Inc", "Amount"]);
        assert_eq!(parsed.rows[0], vec!["Acme, Inc", "1"]);
    }

    #[test]
    fn falls_back_to_windows_1252_for_non_utf8_bytes() {
        // "Café" with a Windows-1252 e-acute.
        let mut bytes = b"Supplier,Amount\nCaf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b",10\n");
        let parsed = parse_upload(&UploadFile::new("latin.csv", bytes), None).unwrap();
        assert_eq!(parsed.rows[0][0], "Café");
    }

    #[test]
    fn pads_and_truncates_ragged_rows_to_header_width() {
        let parsed = parse_upload(&upload("ragged.csv", "A,B,C\n1,2\n1,2,3,4\n"), None).unwrap();
        assert_eq!(parsed.rows[0], vec!["1", "2", ""]);
        assert_eq!(parsed.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn drops_columns_with_no_name_and_no_data() {
        let parsed = parse_upload(&upload("blank.csv", "A,,B\n1,,2\n3,,4\n"), None).unwrap();
        assert_eq!(parsed.headers, vec!["A", "B"]);
        assert_eq!(parsed.rows, vec![vec!["1".to_string(), "2".into()], vec![
            "3".to_string(),
            "4".into()
        ]]);
    }

    #[test]
    fn keeps_unnamed_columns_that_carry_data() {
        let parsed = parse_upload(&upload("anon.csv", "A,\n1,x\n"), None).unwrap();
        assert_eq!(parsed.headers, vec!["A", ""]);
        assert_eq!(parsed.rows[0], vec!["1", "x"]);
    }

    #[test]
    fn empty_and_headerless_files_are_errors() {
        assert!(parse_upload(&UploadFile::new("empty.csv", Vec::new()), None).is_err());
        assert!(parse_upload(&upload("nohead.csv", ",,\n"), None).is_err());
    }

    #[test]
    fn header_only_files_parse_with_zero_rows() {
        let parsed = parse_upload(&upload("head.csv", "Supplier,Amount\n"), None).unwrap();
        assert!(parsed.rows.is_empty());
    }
}
