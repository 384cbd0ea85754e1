use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};

/// Parses a monetary cell as an exact decimal. Strips currency symbols and
/// thousands separators; a value wrapped in parentheses is a credit and
/// parses as negative. Blank cells parse as `None`.
pub fn parse_money(value: &str) -> Result<Option<Decimal>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (body, credit) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };
    let cleaned: String = body.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        bail!("Failed to parse '{value}' as a monetary amount");
    }
    let amount: Decimal = cleaned
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as a monetary amount"))?;
    Ok(Some(if credit { -amount } else { amount }))
}

/// Parses a quantity cell, tolerating thousands separators and stray
/// currency symbols. Blank cells parse as `None`.
pub fn parse_quantity(value: &str) -> Result<Option<Decimal>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let cleaned: String = trimmed.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let parsed: Decimal = cleaned
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as a quantity"))?;
    Ok(Some(parsed))
}

// US-first order: the exporting procurement systems are US tools. %d/%m/%Y is
// deliberately absent so ambiguous values never swap day and month.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%b-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses a date cell by trying a fixed ordered list of formats; the first
/// successful parse wins. Datetime-shaped cells (spreadsheet exports render
/// date cells with a time component) contribute their date part. Blank cells
/// parse as `None`.
pub fn parse_report_date(value: &str) -> Result<Option<NaiveDate>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(Some(parsed));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Some(parsed.date()));
        }
    }
    Err(anyhow!("Failed to parse '{trimmed}' as a date"))
}

/// Canonical lookup form of a header name: trimmed, inner whitespace runs
/// collapsed, lowercased.
pub fn normalize_header(name: &str) -> String {
    name.split_whitespace().join(" ").to_ascii_lowercase()
}

/// Renders a monetary amount with exactly two decimal places, rounding
/// midpoints away from zero.
pub fn display_money(amount: &Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn parse_money_strips_currency_formatting() {
        assert_eq!(parse_money("$1,234.56").unwrap(), Some(dec("1234.56")));
        assert_eq!(parse_money("  42 ").unwrap(), Some(dec("42")));
        assert_eq!(parse_money("-5.10").unwrap(), Some(dec("-5.10")));
    }

    #[test]
    fn parse_money_treats_parentheses_as_credit() {
        assert_eq!(parse_money("(1,234.50)").unwrap(), Some(dec("-1234.50")));
        assert_eq!(parse_money("($12.00)").unwrap(), Some(dec("-12.00")));
    }

    #[test]
    fn parse_money_handles_blank_and_garbage() {
        assert_eq!(parse_money("").unwrap(), None);
        assert_eq!(parse_money("   ").unwrap(), None);
        assert!(parse_money("n/a").is_err());
        assert!(parse_money("()").is_err());
    }

    #[test]
    fn parse_quantity_tolerates_separators() {
        assert_eq!(parse_quantity("1,250").unwrap(), Some(dec("1250")));
        assert_eq!(parse_quantity("2.5").unwrap(), Some(dec("2.5")));
        assert_eq!(parse_quantity("").unwrap(), None);
        assert!(parse_quantity("twelve").is_err());
    }

    #[test]
    fn parse_report_date_prefers_us_ordering() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_report_date("2024-05-06").unwrap(), Some(expected));
        assert_eq!(parse_report_date("05/06/2024").unwrap(), Some(expected));
        assert_eq!(parse_report_date("5/6/24").unwrap(), Some(expected));
        assert_eq!(parse_report_date("06-May-2024").unwrap(), Some(expected));
    }

    #[test]
    fn parse_report_date_takes_date_part_of_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(
            parse_report_date("2024-05-06 14:30:00").unwrap(),
            Some(expected)
        );
        assert_eq!(
            parse_report_date("05/06/2024 14:30").unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn parse_report_date_rejects_unparseable_values() {
        assert_eq!(parse_report_date("  ").unwrap(), None);
        assert!(parse_report_date("not-a-date").is_err());
        assert!(parse_report_date("2024-13-40").is_err());
    }

    #[test]
    fn normalize_header_collapses_case_and_whitespace() {
        assert_eq!(normalize_header("  Net   Amount "), "net amount");
        assert_eq!(normalize_header("Supplier: Name"), "supplier: name");
    }

    #[test]
    fn display_money_renders_two_decimal_places() {
        assert_eq!(display_money(&dec("1234.5")), "1234.50");
        assert_eq!(display_money(&dec("0.005")), "0.01");
        assert_eq!(display_money(&dec("-3")), "-3.00");
    }
}
