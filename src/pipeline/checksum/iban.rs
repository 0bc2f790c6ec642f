use thiserror::Error;

use super::mod97_digits;

/// Length of a Belgian IBAN (BEkk + 12 digits).
pub const BELGIAN_IBAN_LENGTH: usize = 16;

/// Registered IBAN lengths for the countries Belgian SMEs most often pay.
const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("AT", 20),
    ("BE", 16),
    ("CH", 21),
    ("CZ", 24),
    ("DE", 22),
    ("DK", 18),
    ("ES", 24),
    ("FI", 18),
    ("FR", 27),
    ("GB", 22),
    ("IE", 22),
    ("IT", 27),
    ("LU", 20),
    ("NL", 18),
    ("PL", 28),
    ("PT", 25),
    ("SE", 24),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("IBAN is too short ({0} characters)")]
    TooShort(usize),

    #[error("IBAN contains invalid characters")]
    InvalidCharacters,

    #[error("IBAN for {country} must be {expected} characters, got {actual}")]
    InvalidLength {
        country: String,
        expected: usize,
        actual: usize,
    },

    #[error("IBAN checksum mismatch (mod 97 = {remainder}, expected 1)")]
    ChecksumMismatch { remainder: u32 },
}

/// Strip spaces, dashes and dots and upper-case.
pub fn normalize_iban(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Validate an IBAN and return its normalized form.
///
/// The first four characters move to the end, letters become two-digit
/// numerals (A=10 … Z=35) and the resulting number mod 97 must equal 1.
pub fn validate_iban(raw: &str) -> Result<String, IbanError> {
    let iban = normalize_iban(raw);

    if iban.len() < 5 {
        return Err(IbanError::TooShort(iban.len()));
    }
    if !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IbanError::InvalidCharacters);
    }

    let country = &iban[..2];
    if let Some((_, expected)) = IBAN_LENGTHS.iter().find(|(cc, _)| *cc == country) {
        if iban.len() != *expected {
            return Err(IbanError::InvalidLength {
                country: country.to_string(),
                expected: *expected,
                actual: iban.len(),
            });
        }
    }

    let remainder = iban_remainder(&iban).ok_or(IbanError::InvalidCharacters)?;
    if remainder != 1 {
        return Err(IbanError::ChecksumMismatch { remainder });
    }

    Ok(iban)
}

pub fn is_valid_iban(raw: &str) -> bool {
    validate_iban(raw).is_ok()
}

/// mod 97 of the rearranged IBAN numeral.
fn iban_remainder(iban: &str) -> Option<u32> {
    let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
    let mut numeral = String::with_capacity(rearranged.len() * 2);
    for c in rearranged.chars() {
        // to_digit(36): '0'..'9' → 0..9, 'A'..'Z' → 10..35
        numeral.push_str(&c.to_digit(36)?.to_string());
    }
    mod97_digits(&numeral)
}

/// Positions where a letter sits in the numeric part of a Belgian IBAN,
/// described as likely OCR confusions (`O` for `0`, `I`/`l` for `1`, …).
/// Suggestions only; nothing is corrected automatically.
pub fn ocr_confusables(raw: &str) -> Vec<String> {
    let iban = normalize_iban(raw);
    // Belgian IBANs are all digits after the country code; elsewhere only
    // the check digits are guaranteed numeric.
    let numeric_end = if iban.starts_with("BE") { iban.len() } else { 4 };

    iban.chars()
        .enumerate()
        .take(numeric_end)
        .skip(2)
        .filter_map(|(i, c)| {
            let likely = match c {
                'O' | 'Q' | 'D' => '0',
                'I' | 'L' => '1',
                'Z' => '2',
                'S' => '5',
                'G' => '6',
                'B' => '8',
                _ => return None,
            };
            Some(format!("position {}: '{c}' may be '{likely}'", i + 1))
        })
        .collect()
}
