use std::str::FromStr;

use rust_decimal::Decimal;

/// Standard Belgian VAT rates, in percent.
pub const BELGIAN_VAT_RATES: [u32; 4] = [0, 6, 12, 21];

/// Other EU member-state rates (standard, reduced and parking), in tenths
/// of a percent, tolerated on cross-border documents.
const EU_VAT_RATES_TENTHS: &[i64] = &[
    21, 30, 40, 50, 55, 70, 80, 85, 90, 100, 130, 140, 150, 160, 170, 180, 190, 200, 220,
    230, 240, 250, 255, 270,
];

/// Phrases that mean "no VAT charged on this line" (reverse charge,
/// intra-community supply), in English, French and Dutch.
const ZERO_RATE_PHRASES: &[&str] = &[
    "reverse charge",
    "reverse-charge",
    "intracommunautaire",
    "intra-communautaire",
    "intracommunity",
    "intra-community",
    "autoliquidation",
    "autoliquidatie",
    "verlegd",
    "btw verlegd",
    "medecontractant",
    "cocontractant",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VatRateClass {
    /// One of 0/6/12/21 %.
    Belgian,
    /// A rate used elsewhere in the EU.
    OtherEu,
    Anomalous,
}

pub fn is_zero_rate_phrase(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    ZERO_RATE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Parse a VAT rate into a percentage: `"21%"`, `"21"`, `"21,0 %"`,
/// `"5.5%"`, `"0.21"` (fraction) and reverse-charge phrases (→ 0).
pub fn parse_vat_rate(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_zero_rate_phrase(trimmed) {
        return Some(Decimal::ZERO);
    }

    let has_percent = trimmed.contains('%');
    let numeric: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let value = Decimal::from_str(&numeric).ok()?;

    if value.is_sign_negative() || value > Decimal::ONE_HUNDRED {
        return None;
    }
    // "0.21" without a percent sign is a fraction.
    if !has_percent && value > Decimal::ZERO && value < Decimal::ONE && numeric.contains('.') {
        return Some((value * Decimal::ONE_HUNDRED).normalize());
    }
    Some(value.normalize())
}

/// Canonical `"NN%"` rendering.
pub fn format_vat_rate(rate: Decimal) -> String {
    format!("{}%", rate.normalize())
}

pub fn normalize_vat_rate(raw: &str) -> Option<String> {
    parse_vat_rate(raw).map(format_vat_rate)
}

pub fn classify_vat_rate(rate: Decimal) -> VatRateClass {
    let rate = rate.normalize();
    if BELGIAN_VAT_RATES
        .iter()
        .any(|r| Decimal::from(*r) == rate)
    {
        return VatRateClass::Belgian;
    }
    if EU_VAT_RATES_TENTHS
        .iter()
        .any(|tenths| Decimal::new(*tenths, 1) == rate)
    {
        return VatRateClass::OtherEu;
    }
    VatRateClass::Anomalous
}

/// Strip punctuation/spaces and upper-case: `"BE 0123.456.789"` → `"BE0123456789"`.
pub fn normalize_vat_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Two-letter country prefix of a VAT number, if present.
pub fn vat_country(raw: &str) -> Option<String> {
    let normalized = normalize_vat_number(raw);
    let prefix: String = normalized.chars().take(2).collect();
    if prefix.len() == 2 && prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(prefix)
    } else {
        None
    }
}

/// Compare two VAT numbers ignoring layout. A Belgian number written
/// without its `BE` prefix matches the prefixed form.
pub fn vat_numbers_match(a: &str, b: &str) -> bool {
    let strip = |s: &str| {
        let n = normalize_vat_number(s);
        n.strip_prefix("BE").map(str::to_string).unwrap_or(n)
    };
    let (a, b) = (strip(a), strip(b));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn percent_forms_parse() {
        assert_eq!(parse_vat_rate("21%"), Some(pct("21")));
        assert_eq!(parse_vat_rate("21"), Some(pct("21")));
        assert_eq!(parse_vat_rate("21,0 %"), Some(pct("21")));
        assert_eq!(parse_vat_rate("5.5%"), Some(pct("5.5")));
        assert_eq!(parse_vat_rate("0.21"), Some(pct("21")));
    }

    #[test]
    fn reverse_charge_phrases_are_zero() {
        assert_eq!(parse_vat_rate("Reverse charge"), Some(Decimal::ZERO));
        assert_eq!(parse_vat_rate("Intracommunautaire"), Some(Decimal::ZERO));
        assert_eq!(parse_vat_rate("BTW verlegd"), Some(Decimal::ZERO));
        assert_eq!(normalize_vat_rate("Verlegd").as_deref(), Some("0%"));
    }

    #[test]
    fn nonsense_rates_rejected() {
        assert_eq!(parse_vat_rate(""), None);
        assert_eq!(parse_vat_rate("abc"), None);
        assert_eq!(parse_vat_rate("-6%"), None);
        assert_eq!(parse_vat_rate("210%"), None);
    }

    #[test]
    fn normalized_rendering() {
        assert_eq!(normalize_vat_rate("21,00 %").as_deref(), Some("21%"));
        assert_eq!(normalize_vat_rate("5,5").as_deref(), Some("5.5%"));
    }

    #[test]
    fn classification() {
        for r in ["0", "6", "12", "21"] {
            assert_eq!(classify_vat_rate(pct(r)), VatRateClass::Belgian, "{r}");
        }
        assert_eq!(classify_vat_rate(pct("19")), VatRateClass::OtherEu);
        assert_eq!(classify_vat_rate(pct("5.5")), VatRateClass::OtherEu);
        assert_eq!(classify_vat_rate(pct("11")), VatRateClass::Anomalous);
        assert_eq!(classify_vat_rate(pct("21.5")), VatRateClass::Anomalous);
    }

    #[test]
    fn vat_number_matching() {
        assert!(vat_numbers_match("BE 0123.456.789", "BE0123456789"));
        assert!(vat_numbers_match("0123456789", "BE0123456789"));
        assert!(!vat_numbers_match("BE0123456789", "BE0987654321"));
        assert!(!vat_numbers_match("", ""));
    }

    #[test]
    fn vat_country_prefix() {
        assert_eq!(vat_country("be0123456789").as_deref(), Some("BE"));
        assert_eq!(vat_country("NL123456789B01").as_deref(), Some("NL"));
        assert_eq!(vat_country("0123456789"), None);
    }
}
