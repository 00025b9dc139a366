use crate::decoder::CellValue;
use crate::schema::DecimalSeparator;

const CURRENCY_CODES: &[&str] = &["brl", "usd", "eur", "gbp", "ars", "mxn"];
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '\u{a0}', '\u{202f}'];

/// Parses a locale-formatted monetary cell.
///
/// Numeric cells pass through untouched. Text has currency symbols and codes
/// stripped, thousands separators removed and the decimal separator
/// converted before parsing. Returns `None` for empty or unparseable values;
/// the caller decides whether that means zero or a dropped row.
pub fn parse_amount(cell: &CellValue, separator: DecimalSeparator) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) | CellValue::Empty | CellValue::Date(_) => None,
        CellValue::Text(s) => parse_amount_str(s, separator),
    }
}

/// Same as [`parse_amount`] with the lossy contract: anything unparseable is `0.0`.
pub fn normalize_amount(cell: &CellValue, separator: DecimalSeparator) -> f64 {
    parse_amount(cell, separator).unwrap_or(0.0)
}

pub fn parse_amount_str(raw: &str, separator: DecimalSeparator) -> Option<f64> {
    let mut value = raw.trim().to_lowercase();
    // "r$" before the code list so the bare "$" removal does not leave an "r"
    value = value.replace("r$", "");
    for code in CURRENCY_CODES {
        value = value.replace(code, "");
    }
    value.retain(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(&c));

    let negative_parens = value.starts_with('(') && value.ends_with(')');
    if negative_parens {
        value = value[1..value.len() - 1].to_string();
    }

    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    {
        return None;
    }

    let canonical = match separator {
        DecimalSeparator::Comma if is_point_decimal(&value) => value,
        DecimalSeparator::Comma => value.replace('.', "").replace(',', "."),
        DecimalSeparator::Point => value.replace(',', ""),
    };

    let parsed: f64 = canonical.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(if negative_parens { -parsed } else { parsed })
}

/// A lone point not followed by exactly three digits is a decimal point even
/// in comma-decimal mode: `12.50` and `1234.56` are plain numbers, `1.234` is
/// still read as a thousands group.
fn is_point_decimal(value: &str) -> bool {
    !value.contains(',')
        && value.matches('.').count() == 1
        && value.rsplit('.').next().is_some_and(|fraction| fraction.len() != 3)
}
