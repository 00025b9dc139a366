//! # Daily Profit Ledger
//!
//! A library for turning two independently produced exports, a sales report
//! and an advertising-spend report, into a single daily ledger of revenue,
//! cost, balance and return ratio.
//!
//! ## Core Concepts
//!
//! - **Format detection**: encodings and delimiters are tried in order until the bytes parse as a table
//! - **Header discovery**: report banners above the real header row are skipped
//! - **Column classification**: the date and monetary columns are picked by keyword and content
//! - **Normalization**: locale currency strings become numbers, day-first dates become calendar dates
//! - **Reconciliation**: both daily series are outer-joined on date with zero fill
//!
//! ## Example
//!
//! ```rust,ignore
//! use daily_profit_ledger::*;
//!
//! let config = IngestionConfig::default();
//! let orders = std::fs::read("Order.all.20240101_20240131.xlsx")?;
//! let ads = std::fs::read("Meta-Ads-Report.csv")?;
//!
//! let outcome = process_reports(
//!     SourceFile::new("Order.all.20240101_20240131.xlsx", &orders),
//!     SourceFile::new("Meta-Ads-Report.csv", &ads),
//!     &config,
//! );
//!
//! if let Some(ledger) = outcome.ledger {
//!     let summary = ledger.summary();
//!     println!("profit {:.2}, ROI {:?}%", summary.total_balance, summary.roi_percent);
//! }
//! ```

pub mod aggregate;
pub mod classifier;
pub mod dates;
pub mod decoder;
pub mod error;
pub mod header;
pub mod ingestion;
pub mod money;
pub mod reconcile;
pub mod schema;

pub use aggregate::{aggregate_daily, DailySeries, NormalizedRecord};
pub use classifier::{
    Classification, ColumnClassifier, ColumnMatcher, ColumnRole, ContentPatternMatch,
    NameKeywordMatch,
};
pub use dates::{normalize_date, parse_date_str};
pub use decoder::{CellValue, DecodedTable, FileDecoder, RawTable};
pub use error::{IngestionError, Result};
pub use header::{HeaderLocation, HeaderLocator};
pub use ingestion::*;
pub use money::{normalize_amount, parse_amount, parse_amount_str};
pub use reconcile::{reconcile, LedgerRow, LedgerSummary, RatioPolicy, ReconciledLedger};
pub use schema::*;

use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum IngestionStatus {
    Success {
        days: usize,
        date_column: String,
        value_column: String,
    },
    Failed {
        reason: String,
    },
}

impl IngestionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestionStatus::Success { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub revenue_status: IngestionStatus,
    pub spend_status: IngestionStatus,
    /// Withheld unless both files were ingested.
    pub ledger: Option<ReconciledLedger>,
}

impl ReconciliationOutcome {
    /// Human-readable warnings, one per failed file.
    pub fn warnings(&self) -> Vec<String> {
        [
            (SourceRole::Revenue, &self.revenue_status),
            (SourceRole::Spend, &self.spend_status),
        ]
        .iter()
        .filter_map(|(role, status)| match status {
            IngestionStatus::Failed { reason } => {
                Some(format!("{} report: {}", role.label(), reason))
            }
            IngestionStatus::Success { .. } => None,
        })
        .collect()
    }
}

fn status_of(result: &Result<IngestedSeries>) -> IngestionStatus {
    match result {
        Ok(ingested) => IngestionStatus::Success {
            days: ingested.series.len(),
            date_column: ingested.classification.date_header.clone(),
            value_column: ingested.classification.value_header.clone(),
        },
        Err(e) => IngestionStatus::Failed {
            reason: e.to_string(),
        },
    }
}

pub struct ReconciliationProcessor;

impl ReconciliationProcessor {
    /// Ingests both reports independently and reconciles them when both succeed.
    ///
    /// The two pipelines share no state and run in parallel; reconciliation is
    /// the only join point.
    pub fn process(
        revenue: SourceFile<'_>,
        spend: SourceFile<'_>,
        config: &IngestionConfig,
    ) -> ReconciliationOutcome {
        info!(
            "Reconciling revenue report {} with spend report {}",
            revenue.filename, spend.filename
        );

        let (revenue_result, spend_result) = rayon::join(
            || ingest_detailed(revenue, SourceRole::Revenue, config),
            || ingest_detailed(spend, SourceRole::Spend, config),
        );

        Self::finish(revenue_result, spend_result, config)
    }

    /// Reconciles two already-ingested results.
    pub fn finish(
        revenue: Result<IngestedSeries>,
        spend: Result<IngestedSeries>,
        config: &IngestionConfig,
    ) -> ReconciliationOutcome {
        let revenue_status = status_of(&revenue);
        let spend_status = status_of(&spend);

        let ledger = match (revenue, spend) {
            (Ok(revenue), Ok(spend)) => Some(reconcile(
                &revenue.series,
                &spend.series,
                RatioPolicy::new(config.ratio, config.zero_cost_ratio),
            )),
            (revenue, spend) => {
                for err in [revenue.err(), spend.err()].into_iter().flatten() {
                    warn!("{}", err);
                }
                None
            }
        };

        ReconciliationOutcome {
            revenue_status,
            spend_status,
            ledger,
        }
    }
}

pub fn process_reports(
    revenue: SourceFile<'_>,
    spend: SourceFile<'_>,
    config: &IngestionConfig,
) -> ReconciliationOutcome {
    ReconciliationProcessor::process(revenue, spend, config)
}

/// `reconcile(seriesA, seriesB) -> Ledger` using the ratio settings of `config`.
pub fn reconcile_with_config(
    revenue: &DailySeries,
    cost: &DailySeries,
    config: &IngestionConfig,
) -> ReconciledLedger {
    reconcile(
        revenue,
        cost,
        RatioPolicy::new(config.ratio, config.zero_cost_ratio),
    )
}
