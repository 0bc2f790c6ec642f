use serde::Deserialize;

use crate::models::DocumentType;
use crate::pipeline::response::{parse_json_object, read_confidence, ResponseError};

/// Sender or recipient block as read by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartyHint {
    pub name: Option<String>,
    pub vat_number: Option<String>,
}

impl PartyHint {
    pub fn is_empty(&self) -> bool {
        blank(&self.name) && blank(&self.vat_number)
    }
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| {
        let s = s.trim();
        s.is_empty() || s.eq_ignore_ascii_case("null")
    })
}

/// Classifier output before tenant-direction resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClassification {
    pub document_type: DocumentType,
    pub confidence: f32,
    pub reasoning: String,
    pub language: Option<String>,
    pub sender: PartyHint,
    pub recipient: PartyHint,
}

/// Map a classifier label to a document type.
/// Handles the canonical labels plus French, Dutch and English synonyms.
pub fn parse_document_type(label: &str) -> DocumentType {
    let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        // Canonical and English
        "invoice" | "sales_invoice" | "outgoing_invoice" => DocumentType::Invoice,
        "bill" | "purchase_invoice" | "supplier_invoice" | "incoming_invoice" => {
            DocumentType::Bill
        }
        "credit_note" | "creditnote" | "credit_memo" => DocumentType::CreditNote,
        "pro_forma" | "proforma" | "quote" | "quotation" | "estimate" => DocumentType::ProForma,
        "receipt" | "till_receipt" | "cash_receipt" => DocumentType::Receipt,
        "expense" | "expense_slip" | "expense_note" => DocumentType::Expense,
        // French
        "facture" | "facture_de_vente" => DocumentType::Invoice,
        "facture_fournisseur" | "facture_d'achat" | "facture_achat" => DocumentType::Bill,
        "note_de_crédit" | "note_de_credit" | "avoir" => DocumentType::CreditNote,
        "devis" | "offre" | "facture_pro_forma" => DocumentType::ProForma,
        "ticket" | "ticket_de_caisse" | "reçu" | "recu" => DocumentType::Receipt,
        "note_de_frais" => DocumentType::Expense,
        // Dutch
        "factuur" | "verkoopfactuur" => DocumentType::Invoice,
        "aankoopfactuur" | "inkomende_factuur" => DocumentType::Bill,
        "creditnota" | "kredietnota" => DocumentType::CreditNote,
        "offerte" | "proformafactuur" => DocumentType::ProForma,
        "kasticket" | "kassaticket" | "bon" => DocumentType::Receipt,
        "onkostennota" | "onkostenbon" => DocumentType::Expense,
        _ => DocumentType::Unknown,
    }
}

/// Parse the classifier's raw output.
pub fn parse_classification_response(raw: &str) -> Result<RawClassification, ResponseError> {
    let value = parse_json_object(raw)?;

    let document_type = value
        .get("document_type")
        .and_then(|v| v.as_str())
        .map(parse_document_type)
        .unwrap_or(DocumentType::Unknown);

    let party = |key: &str| -> PartyHint {
        value
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    };

    Ok(RawClassification {
        document_type,
        confidence: read_confidence(value.get("confidence")),
        reasoning: value
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string(),
        language: value
            .get("language")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != "null"),
        sender: party("sender"),
        recipient: party("recipient"),
    })
}
