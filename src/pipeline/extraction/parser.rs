use std::collections::BTreeMap;

use serde_json::Value;

use super::normalize::{
    clean_amount, clean_currency, clean_date, clean_iban, clean_text, clean_vat_number,
    clean_vat_rate,
};
use crate::models::{
    BillFields, DocumentFields, DocumentType, ExpenseFields, ExtractedPayload, FieldProvenance,
    InvoiceFields, LineItem, Party, PaymentDetails, ReceiptFields, Totals, VatBreakdownLine,
};
use crate::pipeline::response::{parse_json_object, read_confidence, ResponseError};

/// Parse an extraction response into a normalized payload of the given type.
pub fn parse_extraction_response(
    raw: &str,
    document_type: DocumentType,
) -> Result<ExtractedPayload, ResponseError> {
    let root = parse_json_object(raw)?;

    // Some models drop the "fields" wrapper and answer with the fields inline.
    let fields_value = root.get("fields").filter(|v| v.is_object()).unwrap_or(&root);

    Ok(ExtractedPayload {
        fields: parse_fields(fields_value, document_type),
        confidence: read_confidence(root.get("confidence")),
        extracted_text: root
            .get("extracted_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        provenance: parse_provenance(root.get("provenance")),
    })
}

fn parse_fields(v: &Value, document_type: DocumentType) -> DocumentFields {
    match document_type {
        DocumentType::Invoice => DocumentFields::Invoice(invoice_fields(v)),
        DocumentType::CreditNote => DocumentFields::CreditNote(invoice_fields(v)),
        DocumentType::ProForma => DocumentFields::ProForma(invoice_fields(v)),
        DocumentType::Bill => DocumentFields::Bill(BillFields {
            supplier: party(v.get("supplier")),
            bill_number: text(v, "bill_number"),
            issue_date: clean_date(raw_str(v, "issue_date").as_deref()),
            due_date: clean_date(raw_str(v, "due_date").as_deref()),
            line_items: line_items(v.get("line_items")),
            totals: totals(v.get("totals")),
            payment: payment(v.get("payment")),
        }),
        DocumentType::Receipt => DocumentFields::Receipt(ReceiptFields {
            merchant: party(v.get("merchant")),
            receipt_number: text(v, "receipt_number"),
            transaction_date: clean_date(raw_str(v, "transaction_date").as_deref()),
            payment_method: text(v, "payment_method"),
            line_items: line_items(v.get("line_items")),
            totals: totals(v.get("totals")),
        }),
        DocumentType::Expense => DocumentFields::Expense(ExpenseFields {
            merchant: party(v.get("merchant")),
            description: text(v, "description"),
            expense_date: clean_date(raw_str(v, "expense_date").as_deref()),
            category: text(v, "category"),
            payment_method: text(v, "payment_method"),
            totals: totals(v.get("totals")),
        }),
        DocumentType::Unknown => DocumentFields::Unknown,
    }
}

fn invoice_fields(v: &Value) -> InvoiceFields {
    InvoiceFields {
        vendor: party(v.get("vendor")),
        client: party(v.get("client")),
        invoice_number: text(v, "invoice_number"),
        issue_date: clean_date(raw_str(v, "issue_date").as_deref()),
        due_date: clean_date(raw_str(v, "due_date").as_deref()),
        line_items: line_items(v.get("line_items")),
        totals: totals(v.get("totals")),
        payment: payment(v.get("payment")),
    }
}

/// A scalar as text. Models sometimes emit amounts as JSON numbers.
fn raw_str(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(v: &Value, key: &str) -> Option<String> {
    clean_text(raw_str(v, key).as_deref())
}

fn amount(v: &Value, key: &str) -> Option<String> {
    clean_amount(raw_str(v, key).as_deref())
}

fn party(v: Option<&Value>) -> Party {
    let Some(v) = v.filter(|v| v.is_object()) else {
        return Party::default();
    };
    Party {
        name: text(v, "name"),
        vat_number: clean_vat_number(raw_str(v, "vat_number").as_deref()),
        address: text(v, "address"),
    }
}

fn line_items(v: Option<&Value>) -> Vec<LineItem> {
    let Some(items) = v.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| LineItem {
            description: text(item, "description"),
            quantity: amount(item, "quantity").map(|q| trim_quantity(&q)),
            unit_price: amount(item, "unit_price"),
            vat_rate: clean_vat_rate(raw_str(item, "vat_rate").as_deref()),
            total: amount(item, "total"),
        })
        .filter(|item| *item != LineItem::default())
        .collect()
}

/// Quantities read as plain numbers: "2.00" → "2", "1.50" → "1.5".
fn trim_quantity(q: &str) -> String {
    if q.contains('.') {
        q.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        q.to_string()
    }
}

fn totals(v: Option<&Value>) -> Totals {
    let Some(v) = v.filter(|v| v.is_object()) else {
        return Totals::default();
    };
    let vat_breakdown = v
        .get("vat_breakdown")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter(|l| l.is_object())
                .map(|l| VatBreakdownLine {
                    rate: clean_vat_rate(raw_str(l, "rate").as_deref()),
                    base: amount(l, "base"),
                    amount: amount(l, "amount"),
                })
                .filter(|l| *l != VatBreakdownLine::default())
                .collect()
        })
        .unwrap_or_default();

    Totals {
        subtotal: amount(v, "subtotal"),
        vat_breakdown,
        total_vat_amount: amount(v, "total_vat_amount"),
        total_amount: amount(v, "total_amount"),
        currency: clean_currency(raw_str(v, "currency").as_deref()),
    }
}

fn payment(v: Option<&Value>) -> PaymentDetails {
    let Some(v) = v.filter(|v| v.is_object()) else {
        return PaymentDetails::default();
    };
    PaymentDetails {
        iban: clean_iban(raw_str(v, "iban").as_deref()),
        bic: text(v, "bic").map(|b| b.replace(' ', "").to_uppercase()),
        payment_reference: text(v, "payment_reference"),
    }
}

/// Provenance entries leniently: malformed entries and page 0 are dropped,
/// field confidence is clamped to [0, 1].
fn parse_provenance(v: Option<&Value>) -> BTreeMap<String, FieldProvenance> {
    let Some(map) = v.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(field, entry)| {
            let mut p: FieldProvenance = serde_json::from_value(entry.clone()).ok()?;
            if p.page_number == 0 {
                return None;
            }
            p.field_confidence = p.field_confidence.clamp(0.0, 1.0);
            Some((field.clone(), p))
        })
        .collect()
}
