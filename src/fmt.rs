use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount the French way, with a narrow thousands gap and a
/// decimal comma: 1 234,56 €
pub fn money(val: Decimal) -> String {
    format!("{} €", amount(val))
}

/// Same as [`money`] without the currency sign, for table columns.
pub fn amount(val: Decimal) -> String {
    let rounded = val.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let cents = format!("{:.2}", rounded.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part}")
    } else {
        format!("{grouped},{dec_part}")
    }
}

/// Percentages as typed, without trailing zeros: 42,5 %
pub fn percent(val: Decimal) -> String {
    format!("{} %", val.normalize().to_string().replace('.', ","))
}

/// Human-readable file size: 1.5 MB
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
