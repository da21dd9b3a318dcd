/// Group the integer digits of an already rounded decimal string with `.`
/// and switch the decimal point to `,`: "1234.50" -> "1.234,50".
fn pt_br_digits(fixed: &str) -> String {
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed, ""));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if dec_part.is_empty() {
        grouped
    } else {
        format!("{grouped},{dec_part}")
    }
}

fn signed_number(val: f64, precision: usize) -> String {
    let val = if val.is_finite() { val } else { 0.0 };
    let fixed = format!("{:.*}", precision, val.abs());
    // -0.004 rounds to "0.00" and must not print a sign
    let negative = val < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let body = pt_br_digits(&fixed);
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Format a value as currency with pt-BR separators: R$ 1.234,56
pub fn money_with(val: f64, symbol: &str) -> String {
    format!("{symbol} {}", signed_number(val, 2))
}

/// Percentage with a comma decimal separator, rounded: 12.345 -> "12,35%".
pub fn percent(val: f64) -> String {
    percent_with_precision(val, 2)
}

pub fn percent_with_precision(val: f64, precision: usize) -> String {
    let val = if val.is_finite() { val } else { 0.0 };
    format!("{}%", format!("{:.*}", precision, val).replace('.', ","))
}

/// Plain number with pt-BR separators and an optional suffix: "1.234,50 km".
pub fn plain(val: f64, suffix: &str) -> String {
    format!("{}{suffix}", signed_number(val, 2))
}

/// Full precision, comma decimal point, no grouping: 1234.5 -> "1234,5".
/// Reads back unambiguously as a pt-BR amount.
pub fn decimal(val: f64) -> String {
    let val = if val.is_finite() { val } else { 0.0 };
    val.to_string().replace('.', ",")
}

/// Year-over-year variation with a direction arrow.
pub fn variation(val: Option<f64>) -> String {
    match val {
        None => "\u{2014}".to_string(),
        Some(v) if v > 0.0 => format!("\u{2191} {}", percent(v)),
        Some(v) if v < 0.0 => format!("\u{2193} {}", percent(v.abs())),
        Some(_) => "\u{2192} 0,00%".to_string(),
    }
}
