//! Locale-aware normalization of the values found in bank statements.
//!
//! French banks export `15/01/2024` and `1 234,56`, card processors emit
//! `2024-01-15T00:00:00` and `1,234.56`, spreadsheets hand back serial
//! numbers. Everything funnels through here before it reaches the ledger.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ReleveError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    #[default]
    Dmy,
    Mdy,
    Ymd,
}

impl DateOrder {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Dmy => "dmy",
            Self::Mdy => "mdy",
            Self::Ymd => "ymd",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "dmy" => Some(Self::Dmy),
            "mdy" => Some(Self::Mdy),
            "ymd" => Some(Self::Ymd),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}

fn expand_year(y: i32, digits: usize) -> i32 {
    if digits <= 2 {
        if y < 70 {
            2000 + y
        } else {
            1900 + y
        }
    } else {
        y
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let n: String = name
        .trim_end_matches('.')
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            'û' | 'ù' => 'u',
            other => other,
        })
        .collect();
    if n.chars().count() < 3 {
        return None;
    }
    // "juin"/"juil" need four letters to tell apart.
    if n.starts_with("juil") || n.starts_with("jul") {
        return Some(7);
    }
    if n.starts_with("juin") || n.starts_with("jun") {
        return Some(6);
    }
    let prefix: String = n.chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "fev" | "feb" => 2,
        "mar" => 3,
        "avr" | "apr" => 4,
        "mai" | "may" => 5,
        "aou" | "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    let year = expand_year(y.parse().ok()?, y.len());
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("static regex"))
}

/// Parses a date cell. `order` only matters for all-numeric forms whose
/// first component is not a four-digit year.
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    // Drop a trailing time part: "15/01/2024 10:22", "2024-01-15T00:00:00".
    let s = match s.find('T') {
        Some(i) if i >= 8 && s[..i].chars().all(|c| c.is_ascii_digit() || c == '-') => &s[..i],
        _ => s,
    };
    let s = match s.rsplit_once(' ') {
        Some((head, tail)) if time_regex().is_match(tail) => head.trim_end(),
        _ => s,
    };

    if s.chars().all(|c| c.is_ascii_digit()) {
        return match s.len() {
            8 => {
                let compact_ymd = || ymd(&s[..4], &s[4..6], &s[6..]);
                let plausible = |d: &NaiveDate| d.year() >= 1970;
                match order {
                    DateOrder::Dmy => ymd(&s[4..], &s[2..4], &s[..2]).filter(plausible).or_else(compact_ymd),
                    DateOrder::Mdy => ymd(&s[4..], &s[..2], &s[2..4]).filter(plausible).or_else(compact_ymd),
                    DateOrder::Ymd => compact_ymd(),
                }
            }
            6 => match order {
                DateOrder::Dmy => ymd(&s[4..], &s[2..4], &s[..2]),
                DateOrder::Mdy => ymd(&s[4..], &s[..2], &s[2..4]),
                DateOrder::Ymd => ymd(&s[..2], &s[2..4], &s[4..]),
            },
            1..=5 => s.parse::<f64>().ok().and_then(excel_serial_to_date),
            _ => None,
        };
    }
    if let Ok(serial) = s.parse::<f64>() {
        return excel_serial_to_date(serial);
    }

    let parts: Vec<&str> = s
        .split(|c: char| matches!(c, '/' | '-' | '.' | ' '))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }

    // "15 janv. 2024", "15-Jan-2024"
    if parts[1].chars().any(|c| c.is_alphabetic()) {
        let month = month_from_name(parts[1])?;
        let year = expand_year(parts[2].parse().ok()?, parts[2].len());
        return NaiveDate::from_ymd_opt(year, month, parts[0].parse().ok()?);
    }
    if !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    if parts[0].len() == 4 {
        return ymd(parts[0], parts[1], parts[2]);
    }
    match order {
        DateOrder::Dmy => ymd(parts[2], parts[1], parts[0]),
        DateOrder::Mdy => ymd(parts[2], parts[0], parts[1]),
        DateOrder::Ymd => ymd(parts[0], parts[1], parts[2]),
    }
}

/// Parses with an explicit strftime pattern, falling back to the heuristics.
pub fn parse_date_with(raw: &str, pattern: Option<&str>, order: DateOrder) -> Option<NaiveDate> {
    if let Some(fmt) = pattern {
        if let Ok(d) = NaiveDate::parse_from_str(raw.trim(), fmt) {
            return Some(d);
        }
    }
    parse_date(raw, order)
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parses an amount cell. `decimal` forces the decimal separator; without it
/// the separator is inferred, a lone comma being read the French way.
pub fn parse_amount(raw: &str, decimal: Option<char>) -> Option<Decimal> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '\u{a0}' | '\u{202f}' | '€' | '$' | '£'))
        .collect();
    for code in ["EUR", "eur", "USD", "GBP"] {
        s = s.replace(code, "");
    }
    if s.is_empty() || s == "-" {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.to_string();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }
    if s.is_empty() {
        return None;
    }

    let decimal = decimal.or_else(|| infer_decimal_separator(&s));
    let canonical: String = s
        .chars()
        .filter_map(|c| match c {
            ',' | '.' if Some(c) == decimal => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect();
    if !canonical.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = Decimal::from_str(&canonical).ok()?;
    Some(if negative { -value } else { value })
}

fn infer_decimal_separator(s: &str) -> Option<char> {
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');
    match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (None, Some(_)) => {
            if s.matches(',').count() == 1 {
                Some(',')
            } else {
                None
            }
        }
        (Some(_), None) => {
            if s.matches('.').count() == 1 {
                Some('.')
            } else {
                None
            }
        }
        (None, None) => None,
    }
}

/// Commercial rounding: half a cent goes away from zero. `None` when the
/// amount does not fit in 64-bit cents.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::RoundingStrategy;
    amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}

/// [`to_cents`] for values headed to the database.
pub fn cents(amount: Decimal) -> Result<i64> {
    to_cents(amount).ok_or(ReleveError::AmountOutOfRange(amount))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ---------------------------------------------------------------------------
// Account numbers
// ---------------------------------------------------------------------------

pub fn normalize_account(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// ISO 13616 check: move the first four characters to the end, map letters
/// to 10..35 and verify the number modulo 97 is 1.
pub fn is_valid_iban(raw: &str) -> bool {
    let iban = normalize_account(raw);
    if !(15..=34).contains(&iban.len()) {
        return false;
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_alphabetic) || !bytes[2..4].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let mut remainder: u32 = 0;
    for c in iban[4..].chars().chain(iban[..4].chars()) {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    remainder == 1
}

/// The 11-character account number embedded in a French or Monegasque IBAN
/// (`FRkk BBBBB GGGGG CCCCCCCCCCC RR`).
pub fn iban_account_number(raw: &str) -> Option<String> {
    let iban = normalize_account(raw);
    if iban.len() != 27 || !(iban.starts_with("FR") || iban.starts_with("MC")) {
        return None;
    }
    Some(iban[14..25].to_string())
}

pub fn trailing_digits(s: &str) -> &str {
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[start..]
}

pub fn strip_leading_zeros(s: &str) -> &str {
    let t = s.trim_start_matches('0');
    if t.is_empty() && !s.is_empty() {
        "0"
    } else {
        t
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

pub fn clean_label(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_date_french_forms() {
        assert_eq!(parse_date("15/01/2024", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("15-01-2024", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("15.01.24", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date(" \"05/03/2023\" ", DateOrder::Dmy), d(2023, 3, 5));
    }

    #[test]
    fn test_parse_date_iso_ignores_order() {
        assert_eq!(parse_date("2024-01-15", DateOrder::Mdy), d(2024, 1, 15));
        assert_eq!(parse_date("2024/01/15", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("2024-01-15T00:00:00", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("15/01/2024 10:22", DateOrder::Dmy), d(2024, 1, 15));
    }

    #[test]
    fn test_parse_date_us_order() {
        assert_eq!(parse_date("01/15/2025", DateOrder::Mdy), d(2025, 1, 15));
        assert_eq!(parse_date("01/15/2025", DateOrder::Dmy), None);
    }

    #[test]
    fn test_parse_date_compact() {
        assert_eq!(parse_date("20240115", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("20121110", DateOrder::Dmy), d(2012, 11, 10));
        assert_eq!(parse_date("15012024", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("150124", DateOrder::Dmy), d(2024, 1, 15));
    }

    #[test]
    fn test_parse_date_month_names() {
        assert_eq!(parse_date("15 janv. 2024", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("3 février 2024", DateOrder::Dmy), d(2024, 2, 3));
        assert_eq!(parse_date("01-Jul-23", DateOrder::Dmy), d(2023, 7, 1));
        assert_eq!(parse_date("30 juin 2023", DateOrder::Dmy), d(2023, 6, 30));
        assert_eq!(parse_date("12 août 2023", DateOrder::Dmy), d(2023, 8, 12));
        assert_eq!(parse_date("15 janv. 2024 10:22", DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date("3 février 2024 08:05:59", DateOrder::Dmy), d(2024, 2, 3));
        assert_eq!(parse_date("15/01/2024 10:22", DateOrder::Dmy), d(2024, 1, 15));
    }

    #[test]
    fn test_parse_date_excel_serial() {
        assert_eq!(parse_date("45667", DateOrder::Dmy), d(2025, 1, 10));
        assert_eq!(parse_date("45667.0", DateOrder::Dmy), d(2025, 1, 10));
        assert_eq!(excel_serial_to_date(45667.0), d(2025, 1, 10));
    }

    #[test]
    fn test_parse_date_rejects_invalid() {
        assert_eq!(parse_date("31/02/2024", DateOrder::Dmy), None);
        assert_eq!(parse_date("00/01/2024", DateOrder::Dmy), None);
        assert_eq!(parse_date("Solde au", DateOrder::Dmy), None);
        assert_eq!(parse_date("", DateOrder::Dmy), None);
    }

    #[test]
    fn test_parse_date_with_pattern() {
        assert_eq!(parse_date_with("2024|01|15", Some("%Y|%m|%d"), DateOrder::Dmy), d(2024, 1, 15));
        assert_eq!(parse_date_with("15/01/2024", Some("%Y|%m|%d"), DateOrder::Dmy), d(2024, 1, 15));
    }

    #[test]
    fn test_parse_amount_french() {
        assert_eq!(parse_amount("1 234,56", None), dec("1234.56"));
        assert_eq!(parse_amount("1\u{a0}234,56 €", None), dec("1234.56"));
        assert_eq!(parse_amount("1.234,56", None), dec("1234.56"));
        assert_eq!(parse_amount("-42,5", None), dec("-42.5"));
    }

    #[test]
    fn test_parse_amount_english() {
        assert_eq!(parse_amount("1,234.56", None), dec("1234.56"));
        assert_eq!(parse_amount("$1,234.56", None), dec("1234.56"));
        assert_eq!(parse_amount("1234.56", None), dec("1234.56"));
        assert_eq!(parse_amount("1,234,567", None), dec("1234567"));
    }

    #[test]
    fn test_parse_amount_with_hint() {
        assert_eq!(parse_amount("1,234", Some('.')), dec("1234"));
        assert_eq!(parse_amount("1,234", Some(',')), dec("1.234"));
        assert_eq!(parse_amount("1.234", Some(',')), dec("1234"));
    }

    #[test]
    fn test_parse_amount_signs() {
        assert_eq!(parse_amount("(500,00)", None), dec("-500.00"));
        assert_eq!(parse_amount("50,00-", None), dec("-50.00"));
        assert_eq!(parse_amount("+12,00", None), dec("12.00"));
        assert_eq!(parse_amount("-$50.00", None), dec("-50.00"));
        assert_eq!(parse_amount("12,00 EUR", None), dec("12.00"));
    }

    #[test]
    fn test_parse_amount_empty_and_garbage() {
        assert_eq!(parse_amount("", None), None);
        assert_eq!(parse_amount("  ", None), None);
        assert_eq!(parse_amount("-", None), None);
        assert_eq!(parse_amount("n/a", None), None);
    }

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(Decimal::from_str("1234.565").unwrap()), Some(123457));
        assert_eq!(to_cents(Decimal::from_str("-0.1").unwrap()), Some(-10));
        assert_eq!(from_cents(-1050), Decimal::from_str("-10.50").unwrap());
    }

    #[test]
    fn test_cents_out_of_range() {
        let huge = parse_amount("123456789012345678901,00", None).unwrap();
        assert_eq!(to_cents(huge), None);
        assert_eq!(to_cents(Decimal::MAX), None);
        assert!(matches!(cents(-huge), Err(ReleveError::AmountOutOfRange(_))));
        assert_eq!(cents(Decimal::from_str("92233720368547758.07").unwrap()).unwrap(), i64::MAX);
    }

    #[test]
    fn test_iban_validation() {
        assert!(is_valid_iban("FR76 3000 6000 0112 3456 7890 189"));
        assert!(is_valid_iban("GB82WEST12345698765432"));
        assert!(!is_valid_iban("FR76 3000 6000 0112 3456 7890 188"));
        assert!(!is_valid_iban("12345678901234567"));
    }

    #[test]
    fn test_iban_account_number() {
        assert_eq!(
            iban_account_number("FR76 3000 6000 0112 3456 7890 189").as_deref(),
            Some("12345678901")
        );
        assert_eq!(iban_account_number("GB82WEST12345698765432"), None);
    }

    #[test]
    fn test_account_helpers() {
        assert_eq!(normalize_account(" fr76-3000 6000 "), "FR7630006000");
        assert_eq!(trailing_digits("****1234"), "1234");
        assert_eq!(trailing_digits("XXXX"), "");
        assert_eq!(strip_leading_zeros("000123"), "123");
        assert_eq!(strip_leading_zeros("000"), "0");
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("  CB   METRO  15/01 "), Some("CB METRO 15/01".to_string()));
        assert_eq!(clean_label("   "), None);
    }
}
