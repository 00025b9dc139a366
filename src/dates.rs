use crate::decoder::CellValue;
use chrono::{NaiveDate, NaiveDateTime};

/// Day-first layouts tried before ISO layouts; a slash-separated date is
/// never read month-first. Two-digit years go first so "05/03/24" is not year 24.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Normalizes a date cell; `None` marks the row as unattributable.
pub fn normalize_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_date_str(s),
        CellValue::Number(_) | CellValue::Empty => None,
    }
}

pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    // RFC 3339 timestamps with an offset keep their local calendar date
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    // drop a trailing time component in any other layout ("01/02/2024 10h", "2024-01-02 10:00 BRT")
    let date_part = value
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or(value);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// True when every non-empty cell in `cells` normalizes to a date.
pub fn all_dates<'a, I>(cells: I) -> bool
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let mut seen = false;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        if normalize_date(cell).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first() {
        assert_eq!(parse_date_str("05/03/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_str("31/12/2023"), Some(ymd(2023, 12, 31)));
        assert_eq!(parse_date_str("05-03-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_str("05.03.2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_str("05/03/24"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_day_first_round_trip() {
        let mut date = ymd(2023, 1, 1);
        while date < ymd(2024, 12, 31) {
            let rendered = date.format("%d/%m/%Y").to_string();
            assert_eq!(parse_date_str(&rendered), Some(date), "{}", rendered);
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_iso_and_timestamps() {
        assert_eq!(parse_date_str("2024-01-02"), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_str("2024-01-02 23:59"), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_str("2024-01-02T08:00:00"), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_str("2024-01-02T23:30:00-03:00"), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_str("02/01/2024 14:05"), Some(ymd(2024, 1, 2)));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(parse_date_str(""), None);
        assert_eq!(parse_date_str("Total"), None);
        assert_eq!(parse_date_str("31/02/2024"), None);
        assert_eq!(normalize_date(&CellValue::Number(45292.0)), None);
        assert_eq!(normalize_date(&CellValue::Date(ymd(2024, 1, 1))), Some(ymd(2024, 1, 1)));
    }

    #[test]
    fn test_all_dates() {
        let cells = vec![
            CellValue::Text("01/01/2024".to_string()),
            CellValue::Empty,
            CellValue::Text("2024-01-02".to_string()),
        ];
        assert!(all_dates(&cells));
        assert!(!all_dates(&[CellValue::Text("x".to_string())]));
        assert!(!all_dates(&[CellValue::Empty]));
    }
}
