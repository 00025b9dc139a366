use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub date: NaiveDate,
    pub amount: f64,
}

/// One summed amount per calendar date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries(BTreeMap<NaiveDate, f64>);

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, date: NaiveDate, amount: f64) {
        *self.0.entry(date).or_insert(0.0) += amount;
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.0.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> + '_ {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &f64)> + '_ {
        self.0.iter()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(NaiveDate, f64)> for DailySeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        let mut series = DailySeries::new();
        for (date, amount) in iter {
            series.add(date, amount);
        }
        series
    }
}

impl From<BTreeMap<NaiveDate, f64>> for DailySeries {
    fn from(map: BTreeMap<NaiveDate, f64>) -> Self {
        Self(map)
    }
}

/// Groups records by date and sums their amounts.
///
/// Returns `None` when no record survived normalization, which the caller
/// reports as `NoValidRecords`.
pub fn aggregate_daily(records: &[NormalizedRecord]) -> Option<DailySeries> {
    let series: DailySeries = records.iter().map(|r| (r.date, r.amount)).collect();
    if series.is_empty() {
        None
    } else {
        Some(series)
    }
}
