//! Semantic column classification.
//!
//! Each role is resolved by an ordered list of [`ColumnMatcher`] strategies;
//! the first strategy returning a column wins. Keywords are tried in
//! priority order and, for each keyword, columns left to right.

use crate::dates::{all_dates, normalize_date};
use crate::decoder::{CellValue, RawTable};
use crate::error::{IngestionError, Result};
use crate::schema::{IngestionConfig, SourceRole};
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnRole {
    DateColumn,
    MonetaryColumn,
    Unclassified,
}

pub trait ColumnMatcher {
    fn name(&self) -> &'static str;

    /// First column accepted by this strategy, ignoring `excluded` columns.
    fn find(&self, table: &RawTable, excluded: &[usize]) -> Option<usize>;
}

/// Matches a column whose header contains one of the keywords.
///
/// With `validate_dates` set, a candidate is only accepted when its first
/// non-empty cell parses as a date; otherwise the search moves on.
pub struct NameKeywordMatch<'a> {
    keywords: &'a [String],
    validate_dates: bool,
}

impl<'a> NameKeywordMatch<'a> {
    pub fn new(keywords: &'a [String]) -> Self {
        Self {
            keywords,
            validate_dates: false,
        }
    }

    pub fn validated_as_dates(keywords: &'a [String]) -> Self {
        Self {
            keywords,
            validate_dates: true,
        }
    }

    fn accepts(&self, table: &RawTable, idx: usize) -> bool {
        if !self.validate_dates {
            return true;
        }
        table
            .first_non_empty(idx)
            .map(|cell| normalize_date(cell).is_some())
            .unwrap_or(false)
    }
}

impl ColumnMatcher for NameKeywordMatch<'_> {
    fn name(&self) -> &'static str {
        "header keyword"
    }

    fn find(&self, table: &RawTable, excluded: &[usize]) -> Option<usize> {
        let headers: Vec<String> = table.headers().iter().map(|h| h.to_lowercase()).collect();

        for keyword in self.keywords {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            for (idx, header) in headers.iter().enumerate() {
                if excluded.contains(&idx) || !header.contains(&keyword) {
                    continue;
                }
                if self.accepts(table, idx) {
                    return Some(idx);
                }
                debug!(
                    "Column '{}' matches '{}' but its first value is not a date",
                    header, keyword
                );
            }
        }
        None
    }
}

/// Matches a column whose content is entirely dates.
///
/// Only short, separator-bearing samples are considered so that long
/// numeric identifiers are never mistaken for dates.
pub struct ContentPatternMatch {
    max_sample_len: usize,
}

impl ContentPatternMatch {
    pub fn new(max_sample_len: usize) -> Self {
        Self { max_sample_len }
    }

    fn looks_like_date(&self, sample: &CellValue) -> bool {
        match sample {
            CellValue::Date(_) => true,
            CellValue::Text(s) => {
                s.chars().count() <= self.max_sample_len
                    && s.contains(|c| matches!(c, '/' | '-' | ':'))
            }
            CellValue::Number(_) | CellValue::Empty => false,
        }
    }
}

impl ColumnMatcher for ContentPatternMatch {
    fn name(&self) -> &'static str {
        "content scan"
    }

    fn find(&self, table: &RawTable, excluded: &[usize]) -> Option<usize> {
        (0..table.width())
            .filter(|idx| !excluded.contains(idx))
            .find(|&idx| {
                table
                    .first_non_empty(idx)
                    .map(|sample| self.looks_like_date(sample) && all_dates(table.column(idx)))
                    .unwrap_or(false)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub date_column: usize,
    pub value_column: usize,
    pub date_header: String,
    pub value_header: String,
}

impl Classification {
    pub fn role_of(&self, idx: usize) -> ColumnRole {
        if idx == self.date_column {
            ColumnRole::DateColumn
        } else if idx == self.value_column {
            ColumnRole::MonetaryColumn
        } else {
            ColumnRole::Unclassified
        }
    }
}

pub struct ColumnClassifier<'a> {
    config: &'a IngestionConfig,
}

impl<'a> ColumnClassifier<'a> {
    pub fn new(config: &'a IngestionConfig) -> Self {
        Self { config }
    }

    pub fn date_matchers(&self) -> Vec<Box<dyn ColumnMatcher + 'a>> {
        vec![
            Box::new(NameKeywordMatch::validated_as_dates(&self.config.date_keywords)),
            Box::new(ContentPatternMatch::new(self.config.max_identifier_sample_len)),
        ]
    }

    pub fn value_matchers(&self, role: SourceRole) -> Vec<Box<dyn ColumnMatcher + 'a>> {
        vec![Box::new(NameKeywordMatch::new(self.config.value_keywords(role)))]
    }

    pub fn find_date_column(&self, table: &RawTable) -> Option<usize> {
        run_matchers(&self.date_matchers(), table, &[], "date")
    }

    pub fn find_value_column(
        &self,
        table: &RawTable,
        role: SourceRole,
        excluded: &[usize],
    ) -> Option<usize> {
        run_matchers(&self.value_matchers(role), table, excluded, role.label())
    }

    pub fn classify(&self, table: &RawTable, role: SourceRole, filename: &str) -> Result<Classification> {
        let headers = table.headers();
        let date_column = self.find_date_column(table);
        let excluded: Vec<usize> = date_column.into_iter().collect();
        let value_column = self.find_value_column(table, role, &excluded);

        match (date_column, value_column) {
            (Some(date_column), Some(value_column)) => {
                info!(
                    "{}: date column '{}', {} column '{}'",
                    filename,
                    headers[date_column],
                    role.label(),
                    headers[value_column]
                );
                Ok(Classification {
                    date_column,
                    value_column,
                    date_header: headers[date_column].clone(),
                    value_header: headers[value_column].clone(),
                })
            }
            (date, value) => {
                let missing = match (date, value) {
                    (None, None) => "date and value",
                    (None, Some(_)) => "date",
                    _ => "value",
                };
                Err(IngestionError::ColumnNotFound {
                    file: filename.to_string(),
                    missing: missing.to_string(),
                    columns: headers,
                })
            }
        }
    }
}

fn run_matchers(
    matchers: &[Box<dyn ColumnMatcher + '_>],
    table: &RawTable,
    excluded: &[usize],
    what: &str,
) -> Option<usize> {
    matchers.iter().find_map(|matcher| {
        let found = matcher.find(table, excluded);
        if let Some(idx) = found {
            debug!("{} column {} found by {}", what, idx, matcher.name());
        }
        found
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|c| {
                            if c.is_empty() {
                                CellValue::Empty
                            } else {
                                CellValue::Text(c.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
            0,
        )
    }

    #[test]
    fn test_revenue_report_classification() {
        let config = IngestionConfig::default();
        let t = table(&[
            &["Order ID", "Order Creation Date", "Product", "Order Total"],
            &["220101ABC", "01/01/2024 10:00", "Shirt", "R$ 59,90"],
        ]);
        let c = ColumnClassifier::new(&config)
            .classify(&t, SourceRole::Revenue, "orders.csv")
            .unwrap();
        assert_eq!(c.date_column, 1);
        assert_eq!(c.value_column, 3);
        assert_eq!(c.role_of(0), ColumnRole::Unclassified);
        assert_eq!(c.role_of(3), ColumnRole::MonetaryColumn);
    }

    #[test]
    fn test_spend_vocabulary_differs_from_revenue() {
        let config = IngestionConfig::default();
        let t = table(&[
            &["Campaign name", "Day", "Amount spent (BRL)"],
            &["Promo", "2024-01-01", "12,30"],
        ]);
        let classifier = ColumnClassifier::new(&config);
        let spend = classifier.classify(&t, SourceRole::Spend, "ads.csv").unwrap();
        assert_eq!((spend.date_column, spend.value_column), (1, 2));

        let err = classifier.classify(&t, SourceRole::Revenue, "ads.csv").unwrap_err();
        assert!(matches!(err, IngestionError::ColumnNotFound { ref missing, .. } if missing == "value"));
    }

    #[test]
    fn test_date_keyword_rejected_when_content_is_not_a_date() {
        let config = IngestionConfig::default();
        let t = table(&[
            &["Update time zone", "Created", "Total"],
            &["GMT-3", "05/02/2024", "10"],
        ]);
        // column 0 matches by name but GMT-3 is not a date; content scan finds column 1
        let date = ColumnClassifier::new(&config).find_date_column(&t);
        assert_eq!(date, Some(1));
    }

    #[test]
    fn test_keyword_priority_order() {
        let keywords = vec!["spent".to_string(), "cost".to_string()];
        let t = table(&[&["Cost per result", "Amount spent"], &["1", "2"]]);
        assert_eq!(NameKeywordMatch::new(&keywords).find(&t, &[]), Some(1));
    }

    #[test]
    fn test_content_scan_skips_identifiers() {
        let matcher = ContentPatternMatch::new(18);
        let t = table(&[
            &["Ref", "When"],
            &["2024-01-01-000000012345", "01/01/2024"],
            &["2024-01-02-000000012346", "02/01/2024"],
        ]);
        assert_eq!(matcher.find(&t, &[]), Some(1));
        assert_eq!(matcher.find(&t, &[1]), None);
    }

    #[test]
    fn test_empty_date_column_is_skipped() {
        let config = IngestionConfig::default();
        let t = table(&[
            &["Payment date", "Order date", "Total"],
            &["", "03/01/2024", "5"],
        ]);
        assert_eq!(ColumnClassifier::new(&config).find_date_column(&t), Some(1));
    }

    #[test]
    fn test_value_column_never_reuses_date_column() {
        let config = IngestionConfig::default();
        let t = table(&[&["Data", "Produto"], &["01/01/2024", "Caneca"]]);
        let err = ColumnClassifier::new(&config)
            .classify(&t, SourceRole::Revenue, "x.csv")
            .unwrap_err();
        match err {
            IngestionError::ColumnNotFound { missing, columns, .. } => {
                assert_eq!(missing, "value");
                assert_eq!(columns, vec!["Data", "Produto"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
