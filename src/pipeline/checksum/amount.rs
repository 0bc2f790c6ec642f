//! Money amounts as decimals.
//!
//! Canonical form is a plain decimal string with a dot separator and at
//! least two fractional digits (`"1234.56"`). The parser also accepts the
//! Belgian/European layouts found on scanned documents (`1.234,56`,
//! `1 234,56`, `€ 12,50`, `12,50-`).

use std::str::FromStr;

use rust_decimal::Decimal;

/// Maximum absolute difference for two amounts to be considered equal.
pub fn amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Parse an amount in canonical or European layout.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut s: String = raw
        .trim()
        .replace("EUR", "")
        .replace("USD", "")
        .replace("GBP", "")
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '£' | '\'' | '\u{202f}'))
        .collect();

    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let canonical = canonical_digits(&s)?;
    let value = Decimal::from_str(&canonical).ok()?;
    Some(if negative { -value } else { value })
}

/// Decide which of `.`/`,` is the decimal separator and drop the other.
fn canonical_digits(s: &str) -> Option<String> {
    let dots = s.matches('.').count();
    let commas = s.matches(',').count();

    match (dots, commas) {
        (0, 0) => Some(s.to_string()),
        (_, 0) => {
            if dots > 1 {
                return Some(s.replace('.', ""));
            }
            let (int_part, frac_part) = s.split_once('.')?;
            // "1.500" on a Belgian document is fifteen hundred; "0.125" is not.
            if frac_part.len() == 3 && !int_part.is_empty() && !int_part.starts_with('0') {
                Some(format!("{int_part}{frac_part}"))
            } else {
                Some(s.to_string())
            }
        }
        (0, _) => {
            if commas > 1 {
                Some(s.replace(',', ""))
            } else {
                Some(s.replace(',', "."))
            }
        }
        _ => {
            let last_dot = s.rfind('.')?;
            let last_comma = s.rfind(',')?;
            if last_comma > last_dot {
                // 1.234,56
                if commas > 1 {
                    return None;
                }
                Some(s.replace('.', "").replace(',', "."))
            } else {
                // 1,234.56
                if dots > 1 {
                    return None;
                }
                Some(s.replace(',', ""))
            }
        }
    }
}

/// Canonical string for an amount: dot separator, at least two decimals,
/// extra precision preserved (`"0.125"` stays `"0.125"`).
pub fn format_amount(value: Decimal) -> String {
    let mut v = value.normalize();
    if v.scale() < 2 {
        v.rescale(2);
    }
    v.to_string()
}

/// Parse and re-render in canonical form.
pub fn normalize_amount(raw: &str) -> Option<String> {
    parse_amount(raw).map(format_amount)
}

/// Equal within the fixed 0.01 tolerance. A difference too large to
/// represent never matches.
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    a.checked_sub(b)
        .is_some_and(|d| d.abs() <= amount_tolerance())
}
