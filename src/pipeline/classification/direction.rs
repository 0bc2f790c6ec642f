//! Invoice-vs-Bill resolution from the tenant's own identity.
//!
//! The model labels the document, but only the tenant knows which side of
//! it they are on: tenant in the sender block → Invoice, tenant in the
//! recipient block → Bill. Both or neither → Unknown at low confidence.

use super::parser::{PartyHint, RawClassification};
use crate::models::DocumentType;
use crate::pipeline::checksum::vat_numbers_match;
use crate::pipeline::ports::TenantContext;

/// Confidence ceiling when direction cannot be resolved.
pub const UNRESOLVED_DIRECTION_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Issued,
    Received,
    Ambiguous,
    Unresolved,
    /// Not enough information to decide; the model's label stands.
    NotApplicable,
}

fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    // OCR often drops or adds the legal form ("Acme" vs "Acme BV").
    a == b || (a.len() >= 4 && b.len() >= 4 && (a.contains(&b) || b.contains(&a)))
}

pub fn tenant_matches(tenant: &TenantContext, party: &PartyHint) -> bool {
    if let (Some(t), Some(p)) = (&tenant.vat_number, &party.vat_number) {
        if vat_numbers_match(t, p) {
            return true;
        }
    }
    match (&tenant.company_name, &party.name) {
        (Some(t), Some(p)) => names_match(t, p),
        _ => false,
    }
}

pub fn detect_direction(tenant: &TenantContext, raw: &RawClassification) -> Direction {
    let tenant_known = tenant.vat_number.is_some() || tenant.company_name.is_some();
    if !tenant_known || (raw.sender.is_empty() && raw.recipient.is_empty()) {
        return Direction::NotApplicable;
    }

    match (
        tenant_matches(tenant, &raw.sender),
        tenant_matches(tenant, &raw.recipient),
    ) {
        (true, false) => Direction::Issued,
        (false, true) => Direction::Received,
        (true, true) => Direction::Ambiguous,
        (false, false) => Direction::Unresolved,
    }
}

/// Apply direction to an Invoice/Bill label. Other labels pass through.
/// Returns the resolved type, confidence and a note for the reasoning.
pub fn resolve_direction(
    tenant: &TenantContext,
    raw: &RawClassification,
) -> (DocumentType, f32, Option<String>) {
    if !raw.document_type.is_directional() {
        return (raw.document_type, raw.confidence, None);
    }

    match detect_direction(tenant, raw) {
        Direction::Issued => (
            DocumentType::Invoice,
            raw.confidence,
            (raw.document_type != DocumentType::Invoice)
                .then(|| "Tenant is the sender: issued invoice".to_string()),
        ),
        Direction::Received => (
            DocumentType::Bill,
            raw.confidence,
            (raw.document_type != DocumentType::Bill)
                .then(|| "Tenant is the recipient: received bill".to_string()),
        ),
        Direction::Ambiguous => (
            DocumentType::Unknown,
            raw.confidence.min(UNRESOLVED_DIRECTION_CONFIDENCE),
            Some("Tenant matches both sender and recipient".to_string()),
        ),
        Direction::Unresolved => (
            DocumentType::Unknown,
            raw.confidence.min(UNRESOLVED_DIRECTION_CONFIDENCE),
            Some("Tenant matches neither sender nor recipient".to_string()),
        ),
        Direction::NotApplicable => (raw.document_type, raw.confidence, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantContext {
        TenantContext {
            vat_number: Some("BE0999888777".into()),
            company_name: Some("Studio Lumen".into()),
            ..Default::default()
        }
    }

    fn raw(label: DocumentType, sender: PartyHint, recipient: PartyHint) -> RawClassification {
        RawClassification {
            document_type: label,
            confidence: 0.9,
            reasoning: String::new(),
            language: None,
            sender,
            recipient,
        }
    }

    fn party(name: &str, vat: Option<&str>) -> PartyHint {
        PartyHint {
            name: Some(name.into()),
            vat_number: vat.map(str::to_string),
        }
    }

    #[test]
    fn tenant_as_sender_is_invoice() {
        let r = raw(
            DocumentType::Bill,
            party("Studio Lumen", Some("BE 0999.888.777")),
            party("Acme BV", Some("BE0123456789")),
        );
        let (t, c, note) = resolve_direction(&tenant(), &r);
        assert_eq!(t, DocumentType::Invoice);
        assert_eq!(c, 0.9);
        assert!(note.is_some());
    }

    #[test]
    fn tenant_as_recipient_is_bill() {
        let r = raw(
            DocumentType::Invoice,
            party("Acme BV", Some("BE0123456789")),
            party("Studio Lumen BV", None),
        );
        let (t, _, _) = resolve_direction(&tenant(), &r);
        assert_eq!(t, DocumentType::Bill);
    }

    #[test]
    fn agreeing_label_has_no_note() {
        let r = raw(
            DocumentType::Bill,
            party("Acme BV", None),
            party("Studio Lumen", None),
        );
        let (t, _, note) = resolve_direction(&tenant(), &r);
        assert_eq!(t, DocumentType::Bill);
        assert!(note.is_none());
    }

    #[test]
    fn both_sides_match_is_unknown_low_confidence() {
        let r = raw(
            DocumentType::Invoice,
            party("Studio Lumen", None),
            party("Studio Lumen", None),
        );
        let (t, c, _) = resolve_direction(&tenant(), &r);
        assert_eq!(t, DocumentType::Unknown);
        assert_eq!(c, UNRESOLVED_DIRECTION_CONFIDENCE);
    }

    #[test]
    fn neither_side_matches_is_unknown() {
        let r = raw(
            DocumentType::Invoice,
            party("Acme BV", None),
            party("Other NV", None),
        );
        assert_eq!(
            detect_direction(&tenant(), &r),
            Direction::Unresolved
        );
        assert_eq!(resolve_direction(&tenant(), &r).0, DocumentType::Unknown);
    }

    #[test]
    fn no_party_information_keeps_label() {
        let r = raw(DocumentType::Invoice, PartyHint::default(), PartyHint::default());
        assert_eq!(
            resolve_direction(&tenant(), &r),
            (DocumentType::Invoice, 0.9, None)
        );
    }

    #[test]
    fn unknown_tenant_keeps_label() {
        let r = raw(
            DocumentType::Bill,
            party("Acme BV", None),
            party("Other NV", None),
        );
        let (t, _, _) = resolve_direction(&TenantContext::default(), &r);
        assert_eq!(t, DocumentType::Bill);
    }

    #[test]
    fn non_directional_types_pass_through() {
        let r = raw(
            DocumentType::Receipt,
            party("Delhaize", None),
            PartyHint::default(),
        );
        assert_eq!(resolve_direction(&tenant(), &r).0, DocumentType::Receipt);
    }
}
