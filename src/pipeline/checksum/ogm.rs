//! Belgian structured communication (OGM/VCS): `+++XXX/XXXX/XXXXX+++`.
//! Ten base digits followed by two check digits = base mod 97, where a
//! remainder of 0 is written as 97.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Largest ten-digit base.
const MAX_BASE: u64 = 9_999_999_999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OgmError {
    #[error("Structured reference must have 12 digits, got {0}")]
    WrongDigitCount(usize),

    #[error("Structured reference contains invalid characters")]
    InvalidCharacters,

    #[error("Structured reference check digits {actual:02} do not match {expected:02}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Structured reference base {0} exceeds ten digits")]
    BaseTooLarge(u64),
}

/// Check digits for a ten-digit base: base mod 97, with 0 mapped to 97.
pub fn ogm_check_digits(base: u64) -> u8 {
    match (base % 97) as u8 {
        0 => 97,
        r => r,
    }
}

/// Build the formatted reference for a base, e.g. `+++012/3456/78939+++`.
pub fn derive_ogm(base: u64) -> Result<String, OgmError> {
    if base > MAX_BASE {
        return Err(OgmError::BaseTooLarge(base));
    }
    let digits = format!("{base:010}{:02}", ogm_check_digits(base));
    Ok(format_ogm(&digits))
}

/// `+++XXX/XXXX/XXXXX+++` from twelve digits.
pub fn format_ogm(digits: &str) -> String {
    format!("+++{}/{}/{}+++", &digits[..3], &digits[3..7], &digits[7..12])
}

/// Twelve digits grouped 3/4/5, optionally framed by `+++` or `***`.
static OGM_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[+*]{3})?\s*\d{3}[\s./]*\d{4}[\s./]*\d{5}\s*(?:[+*]{3})?$").unwrap()
});

/// Does the reference look like a structured communication (as opposed to
/// a free-text payment message)?
pub fn looks_like_ogm(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with("+++") || trimmed.starts_with("***") || OGM_SHAPE.is_match(trimmed)
}

/// Validate a structured reference and return its twelve digits.
pub fn validate_ogm(raw: &str) -> Result<String, OgmError> {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | ' ' | '+' | '*' | '.'))
        .collect();

    if !stripped.chars().all(|c| c.is_ascii_digit()) {
        return Err(OgmError::InvalidCharacters);
    }
    if stripped.len() != 12 {
        return Err(OgmError::WrongDigitCount(stripped.len()));
    }

    let base: u64 = stripped[..10]
        .parse()
        .map_err(|_| OgmError::InvalidCharacters)?;
    let actual: u8 = stripped[10..]
        .parse()
        .map_err(|_| OgmError::InvalidCharacters)?;
    let expected = ogm_check_digits(base);

    if actual != expected {
        return Err(OgmError::ChecksumMismatch { expected, actual });
    }
    Ok(stripped)
}
