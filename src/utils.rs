// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::models::CurrencyCode;

/// Render an amount already expressed in `currency`.
///
/// The display locale is fixed to en-US: `,` groups thousands, `.` separates
/// decimals and the symbol leads. Only the symbol and the number of fraction
/// digits depend on the currency.
pub fn format_money(amount: f64, currency: CurrencyCode) -> String {
    let symbol = currency.symbol();
    if amount.is_nan() {
        return format!("{}NaN", symbol);
    }
    if amount.is_infinite() {
        let sign = if amount < 0.0 { "-" } else { "" };
        return format!("{}{}∞", sign, symbol);
    }

    let digits = currency.decimal_places();
    let scale = 10f64.powi(digits as i32);
    // f64::round rounds half away from zero
    let scaled = (amount.abs() * scale).round();
    let negative = amount < 0.0 && scaled > 0.0;

    let units = (scaled / scale).trunc();
    let fraction = scaled - units * scale;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(symbol);
    out.push_str(&group_thousands(&format!("{:.0}", units)));
    if digits > 0 {
        out.push('.');
        out.push_str(&format!("{:0width$.0}", fraction, width = digits as usize));
    }
    out
}

/// Command-line amount: any finite number.
pub fn parse_amount(value: &str) -> Result<f64, String> {
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if !amount.is_finite() {
        return Err(format!("`{}` is not a finite amount", value));
    }
    Ok(amount)
}

/// Insert `,` every three digits from the right.
pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
