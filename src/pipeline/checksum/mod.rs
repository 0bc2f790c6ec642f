//! Pure validation primitives: IBAN and OGM mod-97 checksums, Belgian
//! amount parsing and VAT rate sanity. No I/O, no model calls.

pub mod amount;
pub mod iban;
pub mod ogm;
pub mod vat;

pub use amount::*;
pub use iban::*;
pub use ogm::*;
pub use vat::*;

/// Remainder of a base-10 digit string modulo 97, computed digit by digit
/// so arbitrarily long numerals never overflow.
pub(crate) fn mod97_digits(digits: &str) -> Option<u32> {
    let mut remainder: u32 = 0;
    for c in digits.chars() {
        let d = c.to_digit(10)?;
        remainder = (remainder * 10 + d) % 97;
    }
    Some(remainder)
}
