//! Turns an uploaded byte buffer into a [`RawTable`].
//!
//! Delimited text is tried as an ordered list of (encoding, delimiter)
//! candidates; the first candidate yielding a rectangular table of at least
//! two columns wins. Spreadsheets skip the search and are read with calamine.

use crate::error::{IngestionError, Result};
use crate::header::{line_start_offset, HeaderLocation, HeaderLocator};
use crate::schema::{Delimiter, FormatHint, IngestionConfig, TextEncoding};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Days, NaiveDate};
use log::{debug, info};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(n.to_string()),
            CellValue::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
        }
    }

    fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Header row plus data rows, all of the same width.
#[derive(Debug, Clone)]
pub struct RawTable {
    rows: Vec<Vec<CellValue>>,
    header_offset: usize,
}

impl RawTable {
    /// `rows[0]` is the header; `header_offset` is its physical line in the source.
    pub fn new(rows: Vec<Vec<CellValue>>, header_offset: usize) -> Self {
        Self {
            rows,
            header_offset,
        }
    }

    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(|c| c.as_text().trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.data_rows()
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&EMPTY_CELL))
    }

    pub fn first_non_empty(&self, idx: usize) -> Option<&CellValue> {
        self.column(idx).find(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct DecodedTable {
    pub table: RawTable,
    pub header: HeaderLocation,
    /// `None` for spreadsheets.
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<char>,
}

pub struct FileDecoder<'a> {
    config: &'a IngestionConfig,
}

impl<'a> FileDecoder<'a> {
    pub fn new(config: &'a IngestionConfig) -> Self {
        Self { config }
    }

    pub fn decode(&self, bytes: &[u8], filename: &str, hint: FormatHint) -> Result<DecodedTable> {
        match hint {
            FormatHint::Spreadsheet => self.decode_spreadsheet(bytes, filename),
            FormatHint::FlatText => self.decode_delimited(bytes, filename),
        }
    }

    fn locator(&self) -> HeaderLocator {
        HeaderLocator::new(&self.config.header_keywords, self.config.header_scan_lines)
    }

    fn encoding_candidates(&self, bytes: &[u8]) -> Vec<TextEncoding> {
        let mut candidates = Vec::with_capacity(self.config.encodings.len() + 1);
        if let Some(bom_encoding) = encoding_from_bom(bytes) {
            candidates.push(bom_encoding);
        }
        for encoding in &self.config.encodings {
            if !candidates.contains(encoding) {
                candidates.push(*encoding);
            }
        }
        candidates
    }

    fn decode_delimited(&self, bytes: &[u8], filename: &str) -> Result<DecodedTable> {
        let locator = self.locator();
        let mut attempts = Vec::new();

        for encoding in self.encoding_candidates(bytes) {
            let text = match decode_text(bytes, encoding) {
                Ok(text) => text,
                Err(reason) => {
                    debug!("{}: {} rejected: {}", filename, encoding.label(), reason);
                    attempts.push(format!("{}: {}", encoding.label(), reason));
                    continue;
                }
            };

            for header in locator.candidates_in_text(&text) {
                let body = &text[line_start_offset(&text, header.index())..];
                let header_line = body.lines().next().unwrap_or_default();
                let mut tried: Vec<u8> = Vec::new();

                for delimiter in &self.config.delimiters {
                    let byte = match delimiter {
                        Delimiter::Comma => b',',
                        Delimiter::Semicolon => b';',
                        Delimiter::Tab => b'\t',
                        Delimiter::Auto => match sniff_delimiter(body) {
                            Some(byte) => byte,
                            None => {
                                attempts.push(format!(
                                    "{}/auto line {}: no consistent delimiter",
                                    encoding.label(),
                                    header.index()
                                ));
                                continue;
                            }
                        },
                    };
                    if tried.contains(&byte) {
                        continue;
                    }
                    tried.push(byte);

                    let outcome = if field_count(header_line, byte) < 2 {
                        Err("header line has a single field".to_string())
                    } else {
                        parse_delimited(body, byte)
                    };

                    match outcome {
                        Ok(rows) => {
                            info!(
                                "{}: decoded as {} with {} delimiter ({} rows, {} columns, header line {})",
                                filename,
                                encoding.label(),
                                delimiter.label(),
                                rows.len(),
                                rows[0].len(),
                                header.index()
                            );
                            return Ok(DecodedTable {
                                table: RawTable::new(rows, header.index()),
                                header,
                                encoding: Some(encoding),
                                delimiter: Some(byte as char),
                            });
                        }
                        Err(reason) => {
                            debug!(
                                "{}: {}/{} line {} rejected: {}",
                                filename,
                                encoding.label(),
                                delimiter.label(),
                                header.index(),
                                reason
                            );
                            attempts.push(format!(
                                "{}/{} line {}: {}",
                                encoding.label(),
                                delimiter.label(),
                                header.index(),
                                reason
                            ));
                        }
                    }
                }
            }
        }

        Err(IngestionError::Decode {
            file: filename.to_string(),
            attempts,
        })
    }

    fn decode_spreadsheet(&self, bytes: &[u8], filename: &str) -> Result<DecodedTable> {
        let spreadsheet_error = |reason: String| IngestionError::Spreadsheet {
            file: filename.to_string(),
            reason,
        };

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| spreadsheet_error(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| spreadsheet_error("workbook has no worksheet".to_string()))?
            .map_err(|e| spreadsheet_error(e.to_string()))?;

        let mut rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();

        let lines: Vec<String> = rows
            .iter()
            .take(self.config.header_scan_lines)
            .map(|row| {
                row.iter()
                    .map(|c| c.as_text().into_owned())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        let header = self
            .locator()
            .candidates(&lines)
            .into_iter()
            .find(|h| {
                rows.get(h.index())
                    .is_some_and(|row| row.iter().filter(|c| !c.is_empty()).count() >= 2)
            })
            .unwrap_or(HeaderLocation::Fallback);

        rows.drain(..header.index().min(rows.len()));
        rows.retain(|row| row.iter().any(|c| !c.is_empty()));

        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if width < 2 {
            return Err(spreadsheet_error(format!(
                "first worksheet has {} usable column(s)",
                width
            )));
        }

        // calamine ranges begin at the first used row, not at sheet row 0
        let first_used_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let header_offset = first_used_row + header.index();

        info!(
            "{}: read first worksheet ({} rows, {} columns, header row {})",
            filename,
            rows.len(),
            width,
            header_offset
        );

        Ok(DecodedTable {
            table: RawTable::new(rows, header_offset),
            header,
            encoding: None,
            delimiter: None,
        })
    }
}

fn encoding_from_bom(bytes: &[u8]) -> Option<TextEncoding> {
    let (encoding, _) = encoding_rs::Encoding::for_bom(bytes)?;
    if encoding == encoding_rs::UTF_8 {
        Some(TextEncoding::Utf8)
    } else {
        Some(TextEncoding::Utf16)
    }
}

/// Decodes `bytes` with a single encoding, rejecting text that cannot be a
/// delimited report in that encoding.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> std::result::Result<String, String> {
    let text = match encoding {
        TextEncoding::Utf8 => {
            let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            encoding_rs::UTF_8
                .decode_without_bom_handling_and_without_replacement(body)
                .ok_or_else(|| "invalid UTF-8 sequence".to_string())?
                .into_owned()
        }
        TextEncoding::Latin1 => {
            // C1 controls are printable punctuation in Windows-1252, never text in Latin-1
            if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
                return Err("contains C1 control bytes".to_string());
            }
            bytes.iter().map(|&b| b as char).collect()
        }
        TextEncoding::Utf16 => {
            let (codec, body) = match bytes {
                [0xFE, 0xFF, rest @ ..] => (encoding_rs::UTF_16BE, rest),
                [0xFF, 0xFE, rest @ ..] => (encoding_rs::UTF_16LE, rest),
                _ => (encoding_rs::UTF_16LE, bytes),
            };
            if body.len() % 2 != 0 {
                return Err("odd byte length".to_string());
            }
            codec
                .decode_without_bom_handling_and_without_replacement(body)
                .ok_or_else(|| "malformed UTF-16".to_string())?
                .into_owned()
        }
        TextEncoding::Windows1252 => {
            let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
    };

    if text.contains('\0') {
        return Err("contains NUL characters".to_string());
    }

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Picks the delimiter most lines agree on, judged by the field count of the
/// first non-blank line. `None` when no candidate splits that line at all.
pub fn sniff_delimiter(content: &str) -> Option<u8> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();
    let (first, rest) = lines.split_first()?;

    // reversed so that ties go to the earlier candidate
    [b'\t', b';', b',', b'|']
        .into_iter()
        .rev()
        .filter_map(|delimiter| {
            let width = field_count(first, delimiter);
            if width < 2 {
                return None;
            }
            let agreeing = 1 + rest
                .iter()
                .filter(|line| field_count(line, delimiter) == width)
                .count();
            Some((agreeing * width, delimiter))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, delimiter)| delimiter)
}

/// Number of fields in the first record of `line`; 0 when it does not parse.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|record| record.ok())
        .map(|record| record.len())
        .unwrap_or(0)
}

fn parse_delimited(body: &str, delimiter: u8) -> std::result::Result<Vec<Vec<CellValue>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(false)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let row: Vec<CellValue> = record.iter().map(CellValue::from_field).collect();
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    match rows.first() {
        None => Err("no rows".to_string()),
        Some(header) if header.len() < 2 => Err("single column".to_string()),
        Some(_) => Ok(rows),
    }
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::from_field(s),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_field(s),
    }
}

/// Converts an Excel 1900-system serial day number to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_utf8_comma_file() {
        let config = IngestionConfig::default();
        let bytes = "Data,Valor\n01/01/2024,\"1.234,56\"\n".as_bytes();
        let decoded = FileDecoder::new(&config)
            .decode(bytes, "a.csv", FormatHint::FlatText)
            .unwrap();
        assert_eq!(decoded.encoding, Some(TextEncoding::Utf8));
        assert_eq!(decoded.delimiter, Some(','));
        assert_eq!(decoded.table.headers(), vec!["Data", "Valor"]);
        assert_eq!(decoded.table.data_rows()[0][1], text("1.234,56"));
    }

    #[test]
    fn test_semicolon_file_rejects_comma_candidate() {
        let config = IngestionConfig::default();
        let bytes = "Data;Valor;Pedido\n01/01/2024;1.234,56;A1\n02/01/2024;10,00;A2\n".as_bytes();
        let decoded = FileDecoder::new(&config)
            .decode(bytes, "b.csv", FormatHint::FlatText)
            .unwrap();
        assert_eq!(decoded.delimiter, Some(';'));
        assert_eq!(decoded.table.width(), 3);
        assert_eq!(decoded.table.data_rows().len(), 2);
    }

    #[test]
    fn test_latin1_bytes_fall_through_utf8() {
        let config = IngestionConfig::default();
        let mut bytes = b"Data;Comiss".to_vec();
        bytes.push(0xE3); // a-tilde in Latin-1
        bytes.extend_from_slice(b"o\n05/03/2024;7,50\n");
        let decoded = FileDecoder::new(&config)
            .decode(&bytes, "c.csv", FormatHint::FlatText)
            .unwrap();
        assert_eq!(decoded.encoding, Some(TextEncoding::Latin1));
        assert_eq!(decoded.table.headers()[1], "Comissão");
    }

    #[test]
    fn test_windows1252_punctuation() {
        let bytes = [b'a', 0x80, b'b'];
        assert!(decode_text(&bytes, TextEncoding::Latin1).is_err());
        assert_eq!(decode_text(&bytes, TextEncoding::Windows1252).unwrap(), "a€b");
    }

    #[test]
    fn test_utf16_with_bom() {
        let config = IngestionConfig::default();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Date\tAmount spent\n2024-01-01\t12.5\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = FileDecoder::new(&config)
            .decode(&bytes, "d.csv", FormatHint::FlatText)
            .unwrap();
        assert_eq!(decoded.encoding, Some(TextEncoding::Utf16));
        assert_eq!(decoded.delimiter, Some('\t'));
        assert_eq!(decoded.table.headers(), vec!["Date", "Amount spent"]);
    }

    #[test]
    fn test_ragged_rows_are_not_a_table() {
        let config = IngestionConfig {
            delimiters: vec![Delimiter::Comma],
            ..IngestionConfig::default()
        };
        let bytes = "Date,Total\n01/01/2024,1,2,3\n".as_bytes();
        let err = FileDecoder::new(&config)
            .decode(bytes, "e.csv", FormatHint::FlatText)
            .unwrap_err();
        match err {
            IngestionError::Decode { file, attempts } => {
                assert_eq!(file, "e.csv");
                assert!(!attempts.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_bytes_fail_to_decode() {
        let config = IngestionConfig::default();
        let err = FileDecoder::new(&config)
            .decode(b"", "empty.csv", FormatHint::FlatText)
            .unwrap_err();
        assert!(matches!(err, IngestionError::Decode { .. }));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a|b|c\n1|2|3\n"), Some(b'|'));
        assert_eq!(sniff_delimiter("a;b\n1;2\n"), Some(b';'));
        assert_eq!(sniff_delimiter("a;b,c\n1;2,3\n"), Some(b';'));
        assert_eq!(sniff_delimiter("single\n"), None);
        assert_eq!(sniff_delimiter(""), None);
    }

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(
            excel_serial_to_date(45292.0),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            excel_serial_to_date(45292.75),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_raw_table_columns() {
        let table = RawTable::new(
            vec![
                vec![text("Date"), text("Total")],
                vec![CellValue::Empty, text("1")],
                vec![text("02/01/2024"), CellValue::Empty],
            ],
            3,
        );
        assert_eq!(table.header_offset(), 3);
        assert_eq!(table.first_non_empty(0), Some(&text("02/01/2024")));
        assert_eq!(table.column(1).count(), 2);
        assert_eq!(table.first_non_empty(5), None);
    }
}
