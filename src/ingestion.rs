use crate::aggregate::{aggregate_daily, DailySeries, NormalizedRecord};
use crate::classifier::{Classification, ColumnClassifier};
use crate::dates::normalize_date;
use crate::decoder::{FileDecoder, RawTable};
use crate::error::{IngestionError, Result};
use crate::money::parse_amount;
use crate::schema::{AmountFallback, FormatHint, IngestionConfig, SourceRole, TextEncoding};
use log::{debug, info};
use serde::Serialize;

/// One uploaded report: its original file name and raw content.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> SourceFile<'a> {
    pub fn new(filename: &'a str, bytes: &'a [u8]) -> Self {
        Self { filename, bytes }
    }

    pub fn format_hint(&self) -> FormatHint {
        FormatHint::from_filename(self.filename)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub rows_read: usize,
    pub invalid_dates: usize,
    pub invalid_amounts: usize,
    pub zero_filled: usize,
}

impl NormalizationStats {
    pub fn rows_dropped(&self) -> usize {
        self.invalid_dates + self.invalid_amounts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestedSeries {
    pub role: SourceRole,
    pub filename: String,
    pub series: DailySeries,
    pub classification: Classification,
    pub header_offset: usize,
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<char>,
    pub stats: NormalizationStats,
}

/// Applies the date and value normalizers to every data row.
///
/// Rows with an invalid date are always dropped. Rows with an unparseable
/// amount are kept at zero or dropped depending on `config.unparseable_amount`.
pub fn normalize_rows(
    table: &RawTable,
    classification: &Classification,
    config: &IngestionConfig,
) -> (Vec<NormalizedRecord>, NormalizationStats) {
    let mut stats = NormalizationStats::default();
    let mut records = Vec::with_capacity(table.data_rows().len());

    for row in table.data_rows() {
        stats.rows_read += 1;

        let date = match row.get(classification.date_column).and_then(normalize_date) {
            Some(date) => date,
            None => {
                stats.invalid_dates += 1;
                continue;
            }
        };

        let parsed = row
            .get(classification.value_column)
            .and_then(|cell| parse_amount(cell, config.decimal_separator));
        let amount = match (parsed, config.unparseable_amount) {
            (Some(amount), _) => amount,
            (None, AmountFallback::ZeroFill) => {
                stats.zero_filled += 1;
                0.0
            }
            (None, AmountFallback::DropRow) => {
                stats.invalid_amounts += 1;
                continue;
            }
        };

        records.push(NormalizedRecord { date, amount });
    }

    (records, stats)
}

/// Runs the full per-file pipeline and keeps the diagnostics of every stage.
pub fn ingest_detailed(
    source: SourceFile<'_>,
    role: SourceRole,
    config: &IngestionConfig,
) -> Result<IngestedSeries> {
    let filename = source.filename;
    let decoded = FileDecoder::new(config).decode(source.bytes, filename, source.format_hint())?;
    let table = &decoded.table;

    if table.data_rows().is_empty() {
        return Err(IngestionError::EmptyInput {
            file: filename.to_string(),
        });
    }

    let classification = ColumnClassifier::new(config).classify(table, role, filename)?;
    let (records, stats) = normalize_rows(table, &classification, config);

    debug!(
        "{}: {} rows read, {} invalid dates, {} invalid amounts, {} amounts zero-filled",
        filename, stats.rows_read, stats.invalid_dates, stats.invalid_amounts, stats.zero_filled
    );

    let series = aggregate_daily(&records).ok_or_else(|| IngestionError::NoValidRecords {
        file: filename.to_string(),
        dropped: stats.rows_dropped(),
    })?;

    info!(
        "{}: {} series with {} days, total {:.2}",
        filename,
        role.label(),
        series.len(),
        series.total()
    );

    Ok(IngestedSeries {
        role,
        filename: filename.to_string(),
        series,
        classification,
        header_offset: table.header_offset(),
        encoding: decoded.encoding,
        delimiter: decoded.delimiter,
        stats,
    })
}

/// `ingest(bytes, filename, role_hint) -> DailySeries | failure`.
pub fn ingest(
    bytes: &[u8],
    filename: &str,
    role: SourceRole,
    config: &IngestionConfig,
) -> Result<DailySeries> {
    ingest_detailed(SourceFile::new(filename, bytes), role, config).map(|ingested| ingested.series)
}
