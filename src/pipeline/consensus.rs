//! Field-by-field comparison of a fast extraction against an expert one.

use std::collections::BTreeSet;

use crate::models::{Conflict, ConflictSeverity, ConsensusReport, ExtractedPayload};
use crate::pipeline::checksum::parse_amount;

const AMOUNT_SUFFIXES: &[&str] = &[
    "amount",
    "subtotal",
    "total",
    "unit_price",
    "quantity",
    "base",
];

const IDENTIFIER_SUFFIXES: &[&str] = &["iban", "bic", "vat_number", "payment_reference"];

fn last_segment(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field)
}

fn is_amount_field(field: &str) -> bool {
    let last = last_segment(field);
    AMOUNT_SUFFIXES.iter().any(|s| last.ends_with(s))
}

fn is_identifier_field(field: &str) -> bool {
    IDENTIFIER_SUFFIXES.contains(&last_segment(field))
}

fn values_agree(field: &str, a: &str, b: &str) -> bool {
    if is_amount_field(field) {
        if let (Some(x), Some(y)) = (parse_amount(a), parse_amount(b)) {
            return x == y;
        }
    }
    if is_identifier_field(field) {
        let canon = |s: &str| -> String {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_uppercase())
                .collect()
        };
        return canon(a) == canon(b);
    }
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Fields whose disagreement blocks auto-approval.
fn critical_fields(payload: &ExtractedPayload) -> Vec<String> {
    let mut fields = vec![
        "totals.total_amount".to_string(),
        "totals.subtotal".to_string(),
        "totals.total_vat_amount".to_string(),
        "payment.iban".to_string(),
        "payment.payment_reference".to_string(),
        payload.fields.document_date().0.to_string(),
    ];
    if let Some((prefix, _)) = payload.fields.issuer() {
        fields.push(format!("{prefix}.vat_number"));
    }
    fields
}

/// Compare two extractions of the same document.
pub fn compare(fast: &ExtractedPayload, expert: &ExtractedPayload) -> ConsensusReport {
    if fast.document_type() != expert.document_type() {
        return ConsensusReport::new(vec![Conflict {
            field: "document_type".to_string(),
            fast_value: Some(fast.document_type().to_string()),
            expert_value: Some(expert.document_type().to_string()),
            severity: ConflictSeverity::Critical,
        }]);
    }

    let fast_values = fast.field_values();
    let expert_values = expert.field_values();
    let critical = critical_fields(fast);

    let keys: BTreeSet<&String> = fast_values.keys().chain(expert_values.keys()).collect();
    let conflicts = keys
        .into_iter()
        .filter_map(|field| {
            let a = fast_values.get(field);
            let b = expert_values.get(field);
            let agree = match (a, b) {
                (Some(a), Some(b)) => values_agree(field, a, b),
                _ => false,
            };
            if agree {
                return None;
            }
            Some(Conflict {
                field: field.clone(),
                fast_value: a.cloned(),
                expert_value: b.cloned(),
                severity: if critical.contains(field) {
                    ConflictSeverity::Critical
                } else {
                    ConflictSeverity::Minor
                },
            })
        })
        .collect();

    ConsensusReport::new(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentFields, DocumentType, InvoiceFields, Party, Totals};

    fn invoice(total: &str, vendor_name: &str, vat: &str) -> ExtractedPayload {
        let mut p = ExtractedPayload::empty(DocumentType::Invoice);
        p.fields = DocumentFields::Invoice(InvoiceFields {
            vendor: Party {
                name: Some(vendor_name.into()),
                vat_number: Some(vat.into()),
                address: None,
            },
            issue_date: Some("2024-03-15".into()),
            totals: Totals {
                total_amount: Some(total.into()),
                ..Default::default()
            },
            ..Default::default()
        });
        p
    }

    #[test]
    fn identical_extractions_agree() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        assert!(!compare(&a, &a.clone()).has_conflicts());
    }

    #[test]
    fn layout_differences_are_not_conflicts() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        let b = invoice("1500.0", "ACME BV ", "BE 0123.456.789");
        assert!(!compare(&a, &b).has_conflicts());
    }

    #[test]
    fn total_disagreement_is_critical() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        let b = invoice("1600.00", "Acme BV", "BE0123456789");
        let report = compare(&a, &b);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.critical_conflicts().len(), 1);
        assert_eq!(report.conflicts[0].field, "totals.total_amount");
        assert_eq!(report.conflicts[0].expert_value.as_deref(), Some("1600.00"));
    }

    #[test]
    fn name_disagreement_is_minor() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        let b = invoice("1500.00", "Acme Consulting", "BE0123456789");
        let report = compare(&a, &b);
        assert!(report.has_conflicts());
        assert!(report.critical_conflicts().is_empty());
    }

    #[test]
    fn field_missing_on_one_side_conflicts() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        let mut b = a.clone();
        if let DocumentFields::Invoice(f) = &mut b.fields {
            f.vendor.vat_number = None;
        }
        let report = compare(&a, &b);
        assert_eq!(report.conflicts[0].field, "vendor.vat_number");
        assert_eq!(report.conflicts[0].severity, ConflictSeverity::Critical);
        assert!(report.conflicts[0].expert_value.is_none());
    }

    #[test]
    fn type_disagreement_is_a_single_critical_conflict() {
        let a = invoice("1500.00", "Acme BV", "BE0123456789");
        let b = ExtractedPayload::empty(DocumentType::Bill);
        let report = compare(&a, &b);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].field, "document_type");
    }
}
