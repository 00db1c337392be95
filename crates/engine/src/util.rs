//! Validation primitives shared by the ledger operations and the filter
//! builder.
//!
//! `normalize_date`, `parse_date` and `parse_quantity` are re-exported so a
//! form layer can run the same checks on raw input that the engine runs.

use chrono::NaiveDate;
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, Field, ResultEngine};

/// Canonical storage format for calendar dates.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Zero-pads a `YYYY-M-D` date to `YYYY-MM-DD`.
///
/// Returns `None` when the input is not three dash-separated numeric parts
/// with a four digit year and one or two digit month/day.
pub fn normalize_date(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.trim().split('-').collect();
    let &[year, month, day] = parts.as_slice() else {
        return None;
    };
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if year.len() != 4 || !numeric(year) {
        return None;
    }
    if month.len() > 2 || day.len() > 2 || !numeric(month) || !numeric(day) {
        return None;
    }
    Some(format!("{year}-{month:0>2}-{day:0>2}"))
}

/// Parses a calendar date typed into `field`.
pub fn parse_date(field: Field, raw: &str) -> ResultEngine<NaiveDate> {
    let normalized = normalize_date(raw)
        .ok_or_else(|| EngineError::date(field, format!("expected YYYY-MM-DD, got '{raw}'")))?;
    NaiveDate::parse_from_str(&normalized, DATE_FORMAT)
        .map_err(|_| EngineError::date(field, format!("'{normalized}' is not a calendar date")))
}

/// Parses an integer quantity typed into `field`. Sign is not checked here.
pub fn parse_quantity(field: Field, raw: &str) -> ResultEngine<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| EngineError::quantity(field, format!("'{}' is not a whole number", raw.trim())))
}

pub(crate) fn ensure_positive_quantity(field: Field, quantity: i64) -> ResultEngine<()> {
    if quantity <= 0 {
        return Err(EngineError::quantity(field, "quantity must be > 0"));
    }
    Ok(())
}

/// Display form of a stock name: trimmed, inner whitespace collapsed.
pub(crate) fn normalize_stock_display(raw: &str) -> ResultEngine<String> {
    let display = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if display.is_empty() {
        return Err(EngineError::value(
            Field::Stock,
            "stock name must not be empty",
        ));
    }
    Ok(display)
}

/// Lookup key for a stock name. Comparisons on this key are case-insensitive.
pub(crate) fn normalize_stock_key(display: &str) -> String {
    display
        .nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_month_and_day() {
        assert_eq!(normalize_date("2025-6-4").as_deref(), Some("2025-06-04"));
        assert_eq!(normalize_date(" 2025-12-31 ").as_deref(), Some("2025-12-31"));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert_eq!(normalize_date("25-06-04"), None);
        assert_eq!(normalize_date("2025/06/04"), None);
        assert_eq!(normalize_date("2025-006-04"), None);
        assert_eq!(normalize_date("2025-06"), None);
        assert_eq!(normalize_date("2025-0a-04"), None);
    }

    #[test]
    fn impossible_date_is_invalid() {
        let err = parse_date(Field::UseBy, "2025-02-30").unwrap_err();
        assert_eq!(err.field(), Some(Field::UseBy));
        assert!(matches!(err, EngineError::InvalidDate { .. }));
    }

    #[test]
    fn parses_unpadded_date() {
        let date = parse_date(Field::DeliveredAt, "2025-6-4").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
    }

    #[test]
    fn quantity_must_be_numeric() {
        assert_eq!(parse_quantity(Field::Quantity, " 42 ").unwrap(), 42);
        let err = parse_quantity(Field::Quantity, "4.5").unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity { .. }));
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(ensure_positive_quantity(Field::Quantity, 1).is_ok());
        assert!(ensure_positive_quantity(Field::Quantity, 0).is_err());
        assert!(ensure_positive_quantity(Field::Quantity, -3).is_err());
    }

    #[test]
    fn stock_key_is_case_insensitive() {
        let display = normalize_stock_display("  Hex   Bolts ").unwrap();
        assert_eq!(display, "Hex Bolts");
        assert_eq!(normalize_stock_key(&display), "hex bolts");
        assert_eq!(normalize_stock_key("HEX BOLTS"), "hex bolts");
    }

    #[test]
    fn empty_stock_name_is_rejected() {
        assert!(normalize_stock_display("   ").is_err());
    }
}
