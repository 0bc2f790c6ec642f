//! Per-type extraction contract: the JSON shape the model must fill and
//! the minimum field set a payload needs before it can be judged.

use crate::models::{non_blank, DocumentFields, DocumentType, ExtractedPayload};

const TOTALS_TEMPLATE: &str = r#""totals": {
    "subtotal": "amount excl. VAT or null",
    "vat_breakdown": [{"rate": "21%", "base": "amount", "amount": "amount"}],
    "total_vat_amount": "amount or null",
    "total_amount": "amount incl. VAT or null",
    "currency": "EUR"
  }"#;

const LINE_ITEMS_TEMPLATE: &str = r#""line_items": [
    {"description": "text", "quantity": "number or null", "unit_price": "amount or null",
     "vat_rate": "21% or null", "total": "amount or null"}
  ]"#;

const PAYMENT_TEMPLATE: &str = r#""payment": {
    "iban": "IBAN without spaces or null",
    "bic": "BIC or null",
    "payment_reference": "+++XXX/XXXX/XXXXX+++ or free text or null"
  }"#;

const PARTY_TEMPLATE: &str = r#"{"name": "name or null", "vat_number": "VAT or null", "address": "address or null"}"#;

const PROVENANCE_TEMPLATE: &str = r#""provenance": {
    "totals.total_amount": {"page_number": 1, "source_text": "text as printed", "field_confidence": 0.0}
  }"#;

/// JSON template for the `fields` object of a document type.
pub fn fields_template(document_type: DocumentType) -> String {
    match document_type {
        DocumentType::Invoice | DocumentType::CreditNote | DocumentType::ProForma => format!(
            "{{\n  \"vendor\": {PARTY_TEMPLATE},\n  \"client\": {PARTY_TEMPLATE},\n  \
             \"invoice_number\": \"text or null\",\n  \"issue_date\": \"YYYY-MM-DD or null\",\n  \
             \"due_date\": \"YYYY-MM-DD or null\",\n  {LINE_ITEMS_TEMPLATE},\n  \
             {TOTALS_TEMPLATE},\n  {PAYMENT_TEMPLATE}\n}}"
        ),
        DocumentType::Bill => format!(
            "{{\n  \"supplier\": {PARTY_TEMPLATE},\n  \"bill_number\": \"text or null\",\n  \
             \"issue_date\": \"YYYY-MM-DD or null\",\n  \"due_date\": \"YYYY-MM-DD or null\",\n  \
             {LINE_ITEMS_TEMPLATE},\n  {TOTALS_TEMPLATE},\n  {PAYMENT_TEMPLATE}\n}}"
        ),
        DocumentType::Receipt => format!(
            "{{\n  \"merchant\": {PARTY_TEMPLATE},\n  \"receipt_number\": \"text or null\",\n  \
             \"transaction_date\": \"YYYY-MM-DD or null\",\n  \
             \"payment_method\": \"cash | card | bancontact | other | null\",\n  \
             {LINE_ITEMS_TEMPLATE},\n  {TOTALS_TEMPLATE}\n}}"
        ),
        DocumentType::Expense => format!(
            "{{\n  \"merchant\": {PARTY_TEMPLATE},\n  \"description\": \"text or null\",\n  \
             \"expense_date\": \"YYYY-MM-DD or null\",\n  \"category\": \"text or null\",\n  \
             \"payment_method\": \"text or null\",\n  {TOTALS_TEMPLATE}\n}}"
        ),
        DocumentType::Unknown => "{}".to_string(),
    }
}

/// Full response template: fields, confidence, transcription, provenance.
pub fn response_template(document_type: DocumentType) -> String {
    format!(
        "{{\n\"fields\": {},\n\"confidence\": 0.0,\n\"extracted_text\": \"full transcription\",\n{PROVENANCE_TEMPLATE}\n}}",
        fields_template(document_type)
    )
}

/// Human labels of the essential fields missing from a payload.
/// Empty means the payload can be judged.
pub fn missing_essential_fields(payload: &ExtractedPayload) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let total_present = payload
        .totals()
        .is_some_and(|t| non_blank(&t.total_amount));

    match &payload.fields {
        DocumentFields::Invoice(f) | DocumentFields::CreditNote(f) | DocumentFields::ProForma(f) => {
            if !total_present {
                missing.push("total amount");
            }
            if !f.vendor.is_identified() {
                missing.push("vendor name or VAT number");
            }
            if !non_blank(&f.issue_date) {
                missing.push("issue date");
            }
        }
        DocumentFields::Bill(f) => {
            if !total_present {
                missing.push("total amount");
            }
            if !f.supplier.is_identified() {
                missing.push("supplier name or VAT number");
            }
            if !non_blank(&f.issue_date) {
                missing.push("issue date");
            }
        }
        DocumentFields::Receipt(f) => {
            if !total_present {
                missing.push("total amount");
            }
            if !non_blank(&f.merchant.name) {
                missing.push("merchant name");
            }
            if !non_blank(&f.transaction_date) {
                missing.push("transaction date");
            }
        }
        DocumentFields::Expense(f) => {
            if !total_present {
                missing.push("total amount");
            }
            if !non_blank(&f.expense_date) {
                missing.push("expense date");
            }
        }
        DocumentFields::Unknown => missing.push("document fields"),
    }
    missing
}

pub fn has_essential_fields(payload: &ExtractedPayload) -> bool {
    missing_essential_fields(payload).is_empty()
}
