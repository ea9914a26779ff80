//! Currency amounts as integer cents
//!
//! All arithmetic in the service happens on `i64` cents. Decimal strings
//! only appear at the edges: request bodies carry amounts like "5.00",
//! and the site-wide chart feed returns formatted two-decimal strings.

use crate::{PatronageError, PatronageResult};

/// An amount of money in cents.
pub type Cents = i64;

/// Parse a decimal amount string ("5.00", "10", ".50", "-3.25") into cents.
///
/// At most two fraction digits are accepted; a bare sign or empty string
/// is rejected.
pub fn parse_amount(s: &str) -> PatronageResult<Cents> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(PatronageError::Validation(format!(
            "Invalid amount: {:?}",
            s
        )));
    }
    if frac.len() > 2 {
        return Err(PatronageError::Validation(format!(
            "Amounts are limited to two decimal places: {:?}",
            s
        )));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(PatronageError::Validation(format!(
            "Invalid amount: {:?}",
            s
        )));
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| {
            PatronageError::Validation(format!("Amount out of range: {:?}", s))
        })?
    };

    // Right-pad the fraction to two digits: ".5" means 50 cents.
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac.parse::<i64>().unwrap_or(0),
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac))
        .ok_or_else(|| PatronageError::Validation(format!("Amount out of range: {:?}", s)))?;

    Ok(if negative { -cents } else { cents })
}

/// Format cents as a two-decimal string: 300 -> "3.00", -50 -> "-0.50".
pub fn format_amount(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Convert cents to an `f64` currency value for JSON feeds that carry
/// native numbers.
pub fn to_f64(cents: Cents) -> f64 {
    cents as f64 / 100.0
}
