use crate::aggregate::DailySeries;
use crate::schema::{RatioConvention, ZeroCostRatio};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    /// Always `revenue - cost`.
    pub balance: f64,
    /// `None` when cost is zero and the ratio is left undefined.
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioPolicy {
    pub convention: RatioConvention,
    pub zero_cost: ZeroCostRatio,
}

impl Default for RatioPolicy {
    fn default() -> Self {
        Self {
            convention: RatioConvention::Roas,
            zero_cost: ZeroCostRatio::Undefined,
        }
    }
}

impl RatioPolicy {
    pub fn new(convention: RatioConvention, zero_cost: ZeroCostRatio) -> Self {
        Self {
            convention,
            zero_cost,
        }
    }

    pub fn ratio(&self, revenue: f64, cost: f64) -> Option<f64> {
        if cost > 0.0 {
            Some(match self.convention {
                RatioConvention::Roas => revenue / cost,
                RatioConvention::RoiPercent => (revenue - cost) / cost * 100.0,
            })
        } else {
            match self.zero_cost {
                ZeroCostRatio::Undefined => None,
                ZeroCostRatio::Zero => Some(0.0),
            }
        }
    }
}

/// Daily rows sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledLedger {
    pub policy: RatioPolicy,
    pub rows: Vec<LedgerRow>,
}

/// Outer-joins revenue and cost series on date.
///
/// Every date from either side appears exactly once; a side without an
/// entry for that date contributes zero.
pub fn reconcile(revenue: &DailySeries, cost: &DailySeries, policy: RatioPolicy) -> ReconciledLedger {
    let dates: BTreeSet<NaiveDate> = revenue.dates().chain(cost.dates()).copied().collect();

    let rows: Vec<LedgerRow> = dates
        .into_iter()
        .map(|date| {
            let revenue = revenue.get(&date).unwrap_or(0.0);
            let cost = cost.get(&date).unwrap_or(0.0);
            LedgerRow {
                date,
                revenue,
                cost,
                balance: revenue - cost,
                ratio: policy.ratio(revenue, cost),
            }
        })
        .collect();

    debug!(
        "Reconciled {} revenue days and {} cost days into {} ledger rows",
        revenue.len(),
        cost.len(),
        rows.len()
    );

    ReconciledLedger { policy, rows }
}

impl ReconciledLedger {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.rows.first()?.date, self.rows.last()?.date))
    }

    /// Rows with `start <= date <= end`.
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> &[LedgerRow] {
        if end < start {
            return &[];
        }
        let lo = self.rows.partition_point(|r| r.date < start);
        let hi = self.rows.partition_point(|r| r.date <= end);
        &self.rows[lo..hi]
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::from_rows(&self.rows, self.policy)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(["date", "revenue", "cost", "balance", "ratio"])?;
        for row in &self.rows {
            out.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                format!("{:.2}", row.revenue),
                format!("{:.2}", row.cost),
                format!("{:.2}", row.balance),
                row.ratio.map(|r| format!("{:.4}", r)).unwrap_or_default(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub days: usize,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_balance: f64,
    /// (revenue - cost) / cost * 100 over the whole slice.
    pub roi_percent: Option<f64>,
    /// revenue / cost over the whole slice.
    pub roas: Option<f64>,
}

impl LedgerSummary {
    pub fn from_rows(rows: &[LedgerRow], policy: RatioPolicy) -> Self {
        let total_revenue: f64 = rows.iter().map(|r| r.revenue).sum();
        let total_cost: f64 = rows.iter().map(|r| r.cost).sum();
        let total_balance: f64 = rows.iter().map(|r| r.balance).sum();

        let roi = RatioPolicy::new(RatioConvention::RoiPercent, policy.zero_cost);
        let roas = RatioPolicy::new(RatioConvention::Roas, policy.zero_cost);

        Self {
            days: rows.len(),
            total_revenue,
            total_cost,
            total_balance,
            roi_percent: roi.ratio(total_revenue, total_cost),
            roas: roas.ratio(total_revenue, total_cost),
        }
    }
}
