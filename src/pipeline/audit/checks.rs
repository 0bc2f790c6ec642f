//! Deterministic audit checks over an extracted payload.
//!
//! Missing inputs never fail a check: the check is reported as skipped
//! (passed, Info). Only present-but-inconsistent data fails.

use rust_decimal::Decimal;

use crate::models::{AuditCheck, CheckType, DocumentFields, ExtractedPayload, Party, Severity};
use crate::pipeline::checksum::{
    amount_tolerance, amounts_match, classify_vat_rate, format_amount, format_vat_rate,
    looks_like_ogm, ocr_confusables, parse_amount, parse_vat_rate, validate_iban, validate_ogm,
    vat_country, IbanError, OgmError, VatRateClass,
};
use crate::pipeline::ports::RegistryEntry;

const IBAN_FIELD: &str = "payment.iban";
const REFERENCE_FIELD: &str = "payment.payment_reference";
const TOTAL_FIELD: &str = "totals.total_amount";
const SUBTOTAL_FIELD: &str = "totals.subtotal";
const VAT_TOTAL_FIELD: &str = "totals.total_vat_amount";

fn amount(value: &Option<String>) -> Option<Decimal> {
    value.as_deref().and_then(parse_amount)
}

/// Sum that stops at the first overflow.
fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn within(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|d| d.abs() <= tolerance)
}

/// Arithmetic on the extracted amounts overflowed: no real document gets
/// there, so a digit run was misread.
fn out_of_range(field: &str, operation: &str) -> AuditCheck {
    AuditCheck::failed(
        CheckType::Math,
        field,
        Severity::Critical,
        format!("Amount out of range: {operation} overflows"),
    )
    .with_hint(
        "Re-read the amounts; one of them is implausibly large. Check for digits \
         read twice and for a missing decimal separator.",
    )
}

// ─────────────────────────────────────────────
// Math
// ─────────────────────────────────────────────

/// subtotal + total VAT = total amount, within 0.01.
pub fn check_totals(payload: &ExtractedPayload) -> AuditCheck {
    let Some(totals) = payload.totals() else {
        return AuditCheck::skipped(CheckType::Math, TOTAL_FIELD, "No totals on this document");
    };

    let (Some(subtotal), Some(vat), Some(total)) = (
        amount(&totals.subtotal),
        amount(&totals.total_vat_amount),
        amount(&totals.total_amount),
    ) else {
        return AuditCheck::skipped(
            CheckType::Math,
            TOTAL_FIELD,
            "Totals incomplete, arithmetic not checked",
        );
    };

    let Some(expected) = subtotal.checked_add(vat) else {
        return out_of_range(TOTAL_FIELD, "subtotal + VAT");
    };
    if amounts_match(expected, total) {
        AuditCheck::passed(
            CheckType::Math,
            TOTAL_FIELD,
            format!(
                "{} + {} = {}",
                format_amount(subtotal),
                format_amount(vat),
                format_amount(total)
            ),
        )
    } else {
        AuditCheck::failed(
            CheckType::Math,
            TOTAL_FIELD,
            Severity::Critical,
            format!(
                "Subtotal {} + VAT {} = {}, but total amount reads {}",
                format_amount(subtotal),
                format_amount(vat),
                format_amount(expected),
                format_amount(total)
            ),
        )
        .with_hint(
            "Re-read the subtotal, total VAT and total amount. Subtotal plus VAT must \
             equal the total; check for misread digits and decimal separators.",
        )
        .with_values(format_amount(expected), format_amount(total))
    }
}

/// Sum of line totals = subtotal, within 0.01 per line.
pub fn check_line_items_sum(payload: &ExtractedPayload) -> Option<AuditCheck> {
    let items = payload.fields.line_items();
    let subtotal = amount(&payload.totals()?.subtotal)?;
    if items.is_empty() {
        return None;
    }
    let line_totals: Option<Vec<Decimal>> = items.iter().map(|i| amount(&i.total)).collect();
    let Some(sum) = checked_sum(line_totals?) else {
        return Some(out_of_range(SUBTOTAL_FIELD, "the sum of line totals"));
    };

    let tolerance = amount_tolerance() * Decimal::from(items.len());
    if within(sum, subtotal, tolerance) {
        Some(AuditCheck::passed(
            CheckType::Math,
            SUBTOTAL_FIELD,
            format!("{} line items sum to the subtotal", items.len()),
        ))
    } else {
        Some(
            AuditCheck::failed(
                CheckType::Math,
                SUBTOTAL_FIELD,
                Severity::Warning,
                format!(
                    "Line items sum to {}, subtotal reads {}",
                    format_amount(sum),
                    format_amount(subtotal)
                ),
            )
            .with_hint(
                "Re-read every line item total and the subtotal; a line may be missing \
                 or read twice.",
            )
            .with_values(format_amount(sum), format_amount(subtotal)),
        )
    }
}

/// Sum of the VAT breakdown = total VAT, within 0.01 per line.
pub fn check_vat_breakdown(payload: &ExtractedPayload) -> Option<AuditCheck> {
    let totals = payload.totals()?;
    let total_vat = amount(&totals.total_vat_amount)?;
    if totals.vat_breakdown.is_empty() {
        return None;
    }
    let amounts: Option<Vec<Decimal>> = totals
        .vat_breakdown
        .iter()
        .map(|l| amount(&l.amount))
        .collect();
    let Some(sum) = checked_sum(amounts?) else {
        return Some(out_of_range(VAT_TOTAL_FIELD, "the sum of the VAT breakdown"));
    };

    let tolerance = amount_tolerance() * Decimal::from(totals.vat_breakdown.len());
    if within(sum, total_vat, tolerance) {
        Some(AuditCheck::passed(
            CheckType::Math,
            VAT_TOTAL_FIELD,
            "VAT breakdown sums to the total VAT",
        ))
    } else {
        Some(
            AuditCheck::failed(
                CheckType::Math,
                VAT_TOTAL_FIELD,
                Severity::Warning,
                format!(
                    "VAT breakdown sums to {}, total VAT reads {}",
                    format_amount(sum),
                    format_amount(total_vat)
                ),
            )
            .with_hint("Re-read the VAT summary table: each rate's VAT amount and the VAT total.")
            .with_values(format_amount(sum), format_amount(total_vat)),
        )
    }
}

/// quantity × unit price = line total, per line with all three values.
pub fn check_line_arithmetic(payload: &ExtractedPayload) -> Vec<AuditCheck> {
    payload
        .fields
        .line_items()
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let quantity = amount(&item.quantity)?;
            let unit_price = amount(&item.unit_price)?;
            let total = amount(&item.total)?;
            let field = format!("line_items.{i}.total");
            let Some(expected) = quantity.checked_mul(unit_price) else {
                return Some(out_of_range(&field, "quantity × unit price"));
            };

            Some(if amounts_match(expected, total) {
                AuditCheck::passed(CheckType::Math, &field, "Quantity × unit price = line total")
            } else {
                AuditCheck::failed(
                    CheckType::Math,
                    &field,
                    Severity::Warning,
                    format!(
                        "Line {}: {} × {} = {}, line total reads {}",
                        i + 1,
                        quantity.normalize(),
                        format_amount(unit_price),
                        format_amount(expected),
                        format_amount(total)
                    ),
                )
                .with_hint(format!(
                    "Re-read the quantity, unit price and total of line {}.",
                    i + 1
                ))
                .with_values(format_amount(expected), format_amount(total))
            })
        })
        .collect()
}

// ─────────────────────────────────────────────
// Checksums
// ─────────────────────────────────────────────

pub fn check_iban(payload: &ExtractedPayload) -> AuditCheck {
    let Some(raw) = payload
        .payment()
        .and_then(|p| p.iban.as_deref())
        .filter(|s| !s.trim().is_empty())
    else {
        return AuditCheck::skipped(CheckType::ChecksumIban, IBAN_FIELD, "No IBAN present");
    };

    match validate_iban(raw) {
        Ok(iban) => AuditCheck::passed(
            CheckType::ChecksumIban,
            IBAN_FIELD,
            format!("IBAN {iban} checksum valid"),
        ),
        Err(e) => {
            let mut hint = String::from(
                "Re-read the IBAN carefully, common OCR errors: 0↔O, 1↔I, 5↔S, 8↔B.",
            );
            let suspects = ocr_confusables(raw);
            if !suspects.is_empty() {
                hint.push_str(" Suspect characters: ");
                hint.push_str(&suspects.join(", "));
                hint.push('.');
            }
            let check = AuditCheck::failed(
                CheckType::ChecksumIban,
                IBAN_FIELD,
                Severity::Critical,
                format!("Invalid IBAN {raw}: {e}"),
            )
            .with_hint(hint);
            match e {
                IbanError::InvalidLength {
                    expected, actual, ..
                } => check.with_values(
                    format!("{expected} characters"),
                    format!("{actual} characters"),
                ),
                IbanError::ChecksumMismatch { remainder } => {
                    check.with_values("mod 97 = 1", format!("mod 97 = {remainder}"))
                }
                _ => check,
            }
        }
    }
}

pub fn check_payment_reference(payload: &ExtractedPayload) -> AuditCheck {
    let Some(raw) = payload
        .payment()
        .and_then(|p| p.payment_reference.as_deref())
        .filter(|s| !s.trim().is_empty())
    else {
        return AuditCheck::skipped(
            CheckType::ChecksumOgm,
            REFERENCE_FIELD,
            "No payment reference present",
        );
    };

    if !looks_like_ogm(raw) {
        return AuditCheck::skipped(
            CheckType::ChecksumOgm,
            REFERENCE_FIELD,
            "Free-text payment reference, no checksum",
        );
    }

    match validate_ogm(raw) {
        Ok(_) => AuditCheck::passed(
            CheckType::ChecksumOgm,
            REFERENCE_FIELD,
            "Structured communication checksum valid",
        ),
        Err(e) => {
            let check = AuditCheck::failed(
                CheckType::ChecksumOgm,
                REFERENCE_FIELD,
                Severity::Critical,
                format!("Invalid structured communication {raw}: {e}"),
            )
            .with_hint(
                "Re-read the structured communication +++XXX/XXXX/XXXXX+++ digit by digit; \
                 it has exactly 12 digits and the last two are the first ten mod 97.",
            );
            match e {
                OgmError::ChecksumMismatch { expected, actual } => {
                    check.with_values(format!("{expected:02}"), format!("{actual:02}"))
                }
                _ => check,
            }
        }
    }
}

// ─────────────────────────────────────────────
// VAT rates
// ─────────────────────────────────────────────

/// A document is cross-border when any party has a non-Belgian VAT number
/// or the currency is not EUR.
pub fn is_cross_border(payload: &ExtractedPayload) -> bool {
    let foreign_party = payload.fields.parties().iter().any(|(_, party)| {
        party
            .vat_number
            .as_deref()
            .and_then(vat_country)
            .is_some_and(|cc| cc != "BE")
    });
    let foreign_currency = payload
        .totals()
        .and_then(|t| t.currency.as_deref())
        .is_some_and(|c| !c.eq_ignore_ascii_case("EUR"));
    foreign_party || foreign_currency
}

/// Every VAT rate on line items and in the breakdown. Belgian rates pass;
/// other EU rates pass on cross-border documents; anything else is a Warning.
pub fn check_vat_rates(payload: &ExtractedPayload) -> Vec<AuditCheck> {
    let cross_border = is_cross_border(payload);

    let line_rates = payload
        .fields
        .line_items()
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            Some((format!("line_items.{i}.vat_rate"), item.vat_rate.as_deref()?))
        });
    let breakdown_rates = payload
        .totals()
        .map(|t| t.vat_breakdown.as_slice())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            Some((format!("totals.vat_breakdown.{i}.rate"), line.rate.as_deref()?))
        });

    line_rates
        .chain(breakdown_rates)
        .map(|(field, raw)| vat_rate_check(&field, raw, cross_border))
        .collect()
}

fn vat_rate_check(field: &str, raw: &str, cross_border: bool) -> AuditCheck {
    let Some(rate) = parse_vat_rate(raw) else {
        return AuditCheck::failed(
            CheckType::VatRate,
            field,
            Severity::Warning,
            format!("Unreadable VAT rate '{raw}'"),
        )
        .with_hint("Re-read the VAT rate; Belgian rates are 0%, 6%, 12% or 21%.");
    };

    match (classify_vat_rate(rate), cross_border) {
        (VatRateClass::Belgian, _) => AuditCheck::passed(
            CheckType::VatRate,
            field,
            format!("Belgian VAT rate {}", format_vat_rate(rate)),
        ),
        (VatRateClass::OtherEu, true) => AuditCheck::passed(
            CheckType::VatRate,
            field,
            format!("EU VAT rate {} on a cross-border document", format_vat_rate(rate)),
        ),
        _ => AuditCheck::failed(
            CheckType::VatRate,
            field,
            Severity::Warning,
            format!("Unusual VAT rate {}", format_vat_rate(rate)),
        )
        .with_hint("Re-read the VAT rate; Belgian rates are 0%, 6%, 12% or 21%.")
        .with_values("0%, 6%, 12% or 21%", format_vat_rate(rate)),
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Legal-form suffixes ignored when comparing company names.
const LEGAL_FORMS: &[&str] = &[
    "bv", "bvba", "nv", "sa", "srl", "sprl", "scrl", "cv", "cvba", "vof", "commv", "scs", "snc",
    "vzw", "asbl", "gmbh", "sarl", "sas", "ltd", "llc", "inc",
];

pub fn normalize_company_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !LEGAL_FORMS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn company_names_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_company_name(a), normalize_company_name(b));
    !a.is_empty() && (a == b || a.contains(&b) || b.contains(&a))
}

/// Registry checks for one party. `lookup` is the registry answer, where
/// an unavailable registry has already been folded into "not found".
pub fn check_registry_party(
    prefix: &str,
    party: &Party,
    lookup: Option<&RegistryEntry>,
) -> Vec<AuditCheck> {
    let vat_field = format!("{prefix}.vat_number");
    let name_field = format!("{prefix}.name");
    let key_field = if party.vat_number.is_some() {
        &vat_field
    } else {
        &name_field
    };

    let Some(entry) = lookup else {
        return vec![AuditCheck::failed(
            CheckType::CompanyExists,
            key_field,
            Severity::Warning,
            format!("{} not found in the business registry", describe(party)),
        )
        .with_hint(format!(
            "Re-read the {prefix} VAT number; Belgian VAT numbers are BE followed by 10 digits."
        ))];
    };

    let mut checks = Vec::with_capacity(2);
    if entry.active {
        checks.push(AuditCheck::passed(
            CheckType::CompanyExists,
            key_field,
            format!("{} is registered as {}", describe(party), entry.name),
        ));
    } else {
        checks.push(AuditCheck::failed(
            CheckType::CompanyExists,
            key_field,
            Severity::Warning,
            format!("{} is registered but no longer active", entry.name),
        ));
    }

    match party.name.as_deref() {
        Some(name) if company_names_match(name, &entry.name) => checks.push(AuditCheck::passed(
            CheckType::CompanyName,
            &name_field,
            "Name matches the registry",
        )),
        Some(name) => checks.push(
            AuditCheck::failed(
                CheckType::CompanyName,
                &name_field,
                Severity::Warning,
                format!("Name '{name}' differs from registered name '{}'", entry.name),
            )
            .with_hint(format!("Re-read the {prefix} company name."))
            .with_values(entry.name.clone(), name),
        ),
        None => checks.push(AuditCheck::skipped(
            CheckType::CompanyName,
            &name_field,
            "No name to compare",
        )),
    }
    checks
}

fn describe(party: &Party) -> String {
    match (&party.name, &party.vat_number) {
        (Some(name), Some(vat)) => format!("{name} ({vat})"),
        (Some(name), None) => name.clone(),
        (None, Some(vat)) => vat.clone(),
        (None, None) => "Company".to_string(),
    }
}

/// Parties worth a registry lookup: those with a VAT number or a name.
pub fn registry_parties(fields: &DocumentFields) -> Vec<(&'static str, &Party)> {
    fields
        .parties()
        .into_iter()
        .filter(|(_, party)| party.is_identified())
        .collect()
}
