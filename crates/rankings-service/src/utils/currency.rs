//! Rendering of monetary amounts as Brazilian Real text.

/// Formats an amount as `R$ 1.234.567,89`.
///
/// The amount is rounded to whole cents. Thousands are separated by `.`, the decimal separator is
/// `,` and negative amounts carry a leading `-` after the currency symbol.
pub fn format_brl(value: f64) -> String {
    if !value.is_finite() {
        return format!("R$ {value}");
    }

    let cents = (value * 100.0).round();
    // beyond this, `as u128` saturates and the digits would be wrong
    if !cents.is_finite() || cents.abs() >= u128::MAX as f64 {
        return format!("R$ {value}");
    }
    let negative = cents < 0.0;
    let cents = cents.abs() as u128;
    let (units, cents) = (cents / 100, cents % 100);

    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("R$ {sign}{grouped},{cents:02}")
}
