use crate::error::{IngestionError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum SourceRole {
    #[schemars(description = "Sales / revenue report (marketplace orders, commissions, payouts)")]
    Revenue,

    #[schemars(description = "Advertising spend report (campaign costs)")]
    Spend,
}

impl SourceRole {
    pub fn label(self) -> &'static str {
        match self {
            SourceRole::Revenue => "revenue",
            SourceRole::Spend => "spend",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FormatHint {
    #[schemars(description = "Delimited text (CSV, TSV, semicolon separated)")]
    FlatText,

    #[schemars(description = "Binary spreadsheet container (xlsx, xlsm, xls, ods)")]
    Spreadsheet,
}

impl FormatHint {
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                FormatHint::Spreadsheet
            }
            _ => FormatHint::FlatText,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TextEncoding {
    #[schemars(description = "Strict UTF-8; fails on any invalid byte sequence")]
    Utf8,

    #[schemars(description = "ISO-8859-1; every byte maps to the code point of the same value")]
    Latin1,

    #[schemars(description = "UTF-16, little endian unless a big endian byte order mark is present")]
    Utf16,

    #[schemars(description = "Windows-1252, the usual encoding of spreadsheet-exported CSV on Windows")]
    Windows1252,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
    #[schemars(description = "Pick the delimiter producing the most consistent field count over the first lines")]
    Auto,
}

impl Delimiter {
    pub fn label(self) -> &'static str {
        match self {
            Delimiter::Comma => "comma",
            Delimiter::Semicolon => "semicolon",
            Delimiter::Tab => "tab",
            Delimiter::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DecimalSeparator {
    #[schemars(description = "1.234,56 - dot groups thousands, comma marks decimals")]
    Comma,

    #[schemars(description = "1,234.56 - comma groups thousands, dot marks decimals")]
    Point,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AmountFallback {
    #[schemars(description = "Keep the row and count the unparseable amount as zero")]
    ZeroFill,

    #[schemars(description = "Drop the row when its amount cannot be parsed")]
    DropRow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum RatioConvention {
    #[schemars(description = "Return on ad spend: revenue / cost")]
    Roas,

    #[schemars(description = "Return on investment in percent: (revenue - cost) / cost * 100")]
    RoiPercent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ZeroCostRatio {
    #[schemars(description = "The ratio is left undefined (null) on days without cost")]
    Undefined,

    #[schemars(description = "The ratio is reported as 0 on days without cost")]
    Zero,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IngestionConfig {
    #[schemars(description = "Text encodings tried in order for delimited files")]
    pub encodings: Vec<TextEncoding>,

    #[schemars(description = "Field delimiters tried in order for each encoding")]
    pub delimiters: Vec<Delimiter>,

    #[schemars(description = "How many physical lines are scanned for the header row")]
    pub header_scan_lines: usize,

    #[schemars(description = "Words whose presence marks a line as the column header (case-insensitive)")]
    pub header_keywords: Vec<String>,

    #[schemars(description = "Header words identifying the date column, highest priority first")]
    pub date_keywords: Vec<String>,

    #[schemars(description = "Header words identifying the monetary column of a revenue report, highest priority first")]
    pub revenue_keywords: Vec<String>,

    #[schemars(description = "Header words identifying the monetary column of a spend report, highest priority first")]
    pub spend_keywords: Vec<String>,

    #[schemars(description = "Decimal separator used by the source locale")]
    pub decimal_separator: DecimalSeparator,

    #[schemars(description = "What happens to a row whose monetary value cannot be parsed")]
    pub unparseable_amount: AmountFallback,

    #[schemars(description = "Which ratio the ledger reports per day")]
    pub ratio: RatioConvention,

    #[schemars(description = "Ratio reported on days with zero cost")]
    pub zero_cost_ratio: ZeroCostRatio,

    #[schemars(description = "Samples longer than this are treated as identifiers, not dates, when scanning column content")]
    pub max_identifier_sample_len: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            encodings: vec![
                TextEncoding::Utf8,
                TextEncoding::Latin1,
                TextEncoding::Utf16,
                TextEncoding::Windows1252,
            ],
            delimiters: vec![
                Delimiter::Comma,
                Delimiter::Semicolon,
                Delimiter::Tab,
                Delimiter::Auto,
            ],
            header_scan_lines: 30,
            header_keywords: keywords(&[
                "order id",
                "order",
                "pedido",
                "purchase",
                "compra",
                "date",
                "data",
                "period",
                "período",
                "reporting starts",
                "campaign",
                "campanha",
                "ad set",
                "ad name",
                "anúncio",
            ]),
            date_keywords: keywords(&[
                "date",
                "data",
                "dia",
                "day",
                "time",
                "period",
                "created_at",
                "purchase_time",
                "reporting starts",
                "início dos relatórios",
            ]),
            revenue_keywords: keywords(&[
                "total",
                "sale",
                "venda",
                "commission",
                "comissão",
                "income",
                "receita",
                "faturamento",
                "payable",
                "valor",
                "price",
                "preço",
            ]),
            spend_keywords: keywords(&[
                "spent",
                "gasto",
                "valor usado",
                "cost",
                "custo",
                "investimento",
                "amount",
                "valor",
            ]),
            decimal_separator: DecimalSeparator::Comma,
            unparseable_amount: AmountFallback::ZeroFill,
            ratio: RatioConvention::Roas,
            zero_cost_ratio: ZeroCostRatio::Undefined,
            max_identifier_sample_len: 18,
        }
    }
}

impl IngestionConfig {
    pub fn value_keywords(&self, role: SourceRole) -> &[String] {
        match role {
            SourceRole::Revenue => &self.revenue_keywords,
            SourceRole::Spend => &self.spend_keywords,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.encodings.is_empty() {
            return Err(IngestionError::Config(
                "at least one text encoding is required".to_string(),
            ));
        }
        if self.delimiters.is_empty() {
            return Err(IngestionError::Config(
                "at least one delimiter is required".to_string(),
            ));
        }
        if self.header_scan_lines == 0 {
            return Err(IngestionError::Config(
                "header_scan_lines must be greater than zero".to_string(),
            ));
        }
        for (name, list) in [
            ("date_keywords", &self.date_keywords),
            ("revenue_keywords", &self.revenue_keywords),
            ("spend_keywords", &self.spend_keywords),
        ] {
            if list.iter().all(|k| k.trim().is_empty()) {
                return Err(IngestionError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IngestionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(IngestionConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = IngestionConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("header_scan_lines"));
        assert!(schema_json.contains("revenue_keywords"));
        assert!(schema_json.contains("zero_cost_ratio"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = IngestionConfig::from_json_str(
            r#"{ "ratio": "RoiPercent", "decimal_separator": "Point" }"#,
        )
        .unwrap();
        assert_eq!(config.ratio, RatioConvention::RoiPercent);
        assert_eq!(config.decimal_separator, DecimalSeparator::Point);
        assert_eq!(config.header_scan_lines, 30);
        assert_eq!(config.encodings.len(), 4);
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let err = IngestionConfig::from_json_str(r#"{ "delimiters": [] }"#).unwrap_err();
        assert!(matches!(err, IngestionError::Config(_)));

        let err = IngestionConfig::from_json_str(r#"{ "spend_keywords": [" "] }"#).unwrap_err();
        assert!(err.to_string().contains("spend_keywords"));
    }

    #[test]
    fn test_format_hint_from_filename() {
        assert_eq!(FormatHint::from_filename("Order.all.xlsx"), FormatHint::Spreadsheet);
        assert_eq!(FormatHint::from_filename("REPORT.XLS"), FormatHint::Spreadsheet);
        assert_eq!(FormatHint::from_filename("meta-ads.csv"), FormatHint::FlatText);
        assert_eq!(FormatHint::from_filename("no_extension"), FormatHint::FlatText);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = IngestionConfig::default();
        let json = config.to_json_pretty().unwrap();
        let back = IngestionConfig::from_json_str(&json).unwrap();
        assert_eq!(back.revenue_keywords, config.revenue_keywords);
        assert_eq!(back.zero_cost_ratio, ZeroCostRatio::Undefined);
    }
}
