//! Display formatting for card and table cells.
//!
//! Output follows en-US conventions: `,` thousands separator, `.` decimal.

use serde_json::Value;

/// Interpret a JSON number or numeric string.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Fixed-decimal number with thousands grouping.
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    with_sign(value, group_fixed(&fixed))
}

/// Currency amount with 2 to 8 fraction digits.
pub fn format_currency(value: f64, currency: &str) -> String {
    let mut fixed = format!("{:.8}", value.abs());
    while fixed.ends_with('0') && fixed.len() - fixed.find('.').unwrap_or(0) > 3 {
        fixed.pop();
    }

    let amount = group_fixed(&fixed);
    let formatted = match currency_symbol(currency) {
        Some(symbol) => format!("{symbol}{amount}"),
        None => format!("{currency} {amount}"),
    };
    with_sign(value, formatted)
}

/// Percentage with an explicit sign, e.g. `+1.25%`.
pub fn format_percent(value: f64, decimals: usize) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.decimals$}%")
}

/// Compact human-readable rendering of any JSON value.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v > 1_000_000.0 => format!("{}M", format_number(v / 1_000_000.0, 2)),
            Some(v) if v > 1_000.0 => format!("{}K", format_number(v / 1_000.0, 2)),
            Some(v) => format_number(v, 2),
            None => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

fn with_sign(value: f64, formatted: String) -> String {
    let is_zero = formatted.chars().all(|c| !c.is_ascii_digit() || c == '0');
    if value.is_sign_negative() && !is_zero {
        format!("-{formatted}")
    } else {
        formatted
    }
}

/// Insert thousands separators into the integer part of `123456.78`.
fn group_fixed(fixed: &str) -> String {
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{grouped}.{frac}"),
        None => grouped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1234.5, 1), "-1,234.5");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_currency(0.00012345, "usd"), "$0.00012345");
        assert_eq!(format_currency(-3.0, "EUR"), "-€3.00");
        assert_eq!(format_currency(10.0, "CHF"), "CHF 10.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(1.234, 2), "+1.23%");
        assert_eq!(format_percent(-0.5, 1), "-0.5%");
        assert_eq!(format_percent(0.0, 2), "+0.00%");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Null), "N/A");
        assert_eq!(format_value(&json!(true)), "Yes");
        assert_eq!(format_value(&json!(2_500_000)), "2.50M");
        assert_eq!(format_value(&json!(1500)), "1.50K");
        assert_eq!(format_value(&json!(42)), "42.00");
        assert_eq!(format_value(&json!("BTC")), "BTC");
        assert_eq!(format_value(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_numeric() {
        assert_eq!(numeric(&json!("12.5")), Some(12.5));
        assert_eq!(numeric(&json!(3)), Some(3.0));
        assert_eq!(numeric(&json!("abc")), None);
        assert_eq!(numeric(&json!(null)), None);
    }
}
