//! Deterministic normalization of extracted values.
//!
//! The extraction prompt asks the model to normalize, and this module
//! re-applies the same rules to whatever comes back. A value that cannot be
//! normalized becomes `None`; nothing is guessed.

use chrono::{Datelike, NaiveDate};

use crate::pipeline::checksum::{
    normalize_amount, normalize_iban, normalize_vat_number, normalize_vat_rate,
};

/// Strings models use to mean "absent".
const NULLISH: &[&str] = &[
    "null", "none", "n/a", "na", "nil", "-", "--", "not_found", "not found", "unknown",
    "inconnu", "onbekend",
];

/// Trimmed text, or `None` for empty and null-like strings.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || NULLISH.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn clean_amount(raw: Option<&str>) -> Option<String> {
    clean_text(raw).and_then(|s| normalize_amount(&s))
}

pub fn clean_vat_rate(raw: Option<&str>) -> Option<String> {
    clean_text(raw).and_then(|s| normalize_vat_rate(&s))
}

pub fn clean_vat_number(raw: Option<&str>) -> Option<String> {
    clean_text(raw)
        .map(|s| normalize_vat_number(&s))
        .filter(|s| !s.is_empty())
}

/// Spaces and dashes stripped, upper-cased. Not validated here; a wrong
/// IBAN is the audit's business.
pub fn clean_iban(raw: Option<&str>) -> Option<String> {
    clean_text(raw)
        .map(|s| normalize_iban(&s))
        .filter(|s| !s.is_empty())
}

pub fn clean_currency(raw: Option<&str>) -> Option<String> {
    clean_text(raw).map(|s| match s.as_str() {
        "€" => "EUR".to_string(),
        "$" => "USD".to_string(),
        "£" => "GBP".to_string(),
        other => other.to_uppercase(),
    })
}

/// Dates to `YYYY-MM-DD`.
pub fn clean_date(raw: Option<&str>) -> Option<String> {
    clean_text(raw)
        .and_then(|s| parse_date(&s))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Parse ISO, European numeric (`/`, `-`, `.` separators) and French, Dutch
/// or English textual dates. US month-first order is never assumed.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"] {
        // %Y also accepts "24"; short years go through %y below.
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, format) {
            if d.year() >= 1900 {
                return Some(d);
            }
        }
    }
    // Two-digit years: 15/03/24
    for format in ["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"] {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(d);
        }
    }
    parse_textual_date(trimmed)
}

/// "15 janvier 2024", "1er mars 2024", "3 maart 2024", "12 March 2024".
fn parse_textual_date(text: &str) -> Option<NaiveDate> {
    let lower = text.to_lowercase().replace(',', " ");
    let parts: Vec<&str> = lower.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }

    let day_str = parts[0]
        .trim_end_matches("er")
        .trim_end_matches("ème")
        .trim_end_matches("st")
        .trim_end_matches("nd")
        .trim_end_matches("rd")
        .trim_end_matches("th")
        .trim_end_matches('.');
    let day: u32 = day_str.parse().ok()?;
    let month = month_number(parts[1].trim_end_matches('.'))?;
    let year: i32 = parts[2].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        // French
        "janvier" | "janv" => 1,
        "février" | "fevrier" | "févr" | "fevr" => 2,
        "mars" => 3,
        "avril" | "avr" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" | "juil" => 7,
        "août" | "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "décembre" | "decembre" | "déc" => 12,
        // Dutch
        "januari" => 1,
        "februari" => 2,
        "maart" | "mrt" => 3,
        "mei" => 5,
        "juni" => 6,
        "juli" => 7,
        "augustus" => 8,
        "oktober" | "okt" => 10,
        "december" => 12,
        // English
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
