//! Extracted document payloads.
//!
//! One field shape per document family: Invoice, CreditNote and ProForma
//! share `InvoiceFields`; Bill, Receipt and Expense carry their own. Every
//! amount is a decimal-preserving string (`"1234.56"`), never a float.
//! Payloads are immutable once built; a retry produces a new payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::DocumentType;

/// Where on the document a field value was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub page_number: u32,
    pub source_text: String,
    pub field_confidence: f32,
}

/// A company or person block (vendor, client, supplier, merchant).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
}

impl Party {
    /// A party is identified when either a name or a VAT number is present.
    pub fn is_identified(&self) -> bool {
        non_blank(&self.name) || non_blank(&self.vat_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub vat_rate: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VatBreakdownLine {
    pub rate: Option<String>,
    pub base: Option<String>,
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Option<String>,
    #[serde(default)]
    pub vat_breakdown: Vec<VatBreakdownLine>,
    pub total_vat_amount: Option<String>,
    pub total_amount: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub payment_reference: Option<String>,
}

/// Shared by Invoice, CreditNote and ProForma.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFields {
    #[serde(default)]
    pub vendor: Party,
    #[serde(default)]
    pub client: Party,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub payment: PaymentDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillFields {
    #[serde(default)]
    pub supplier: Party,
    pub bill_number: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub payment: PaymentDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptFields {
    #[serde(default)]
    pub merchant: Party,
    pub receipt_number: Option<String>,
    pub transaction_date: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFields {
    #[serde(default)]
    pub merchant: Party,
    pub description: Option<String>,
    pub expense_date: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub totals: Totals,
}

/// Typed fields, one variant per document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", content = "fields", rename_all = "snake_case")]
pub enum DocumentFields {
    Invoice(InvoiceFields),
    CreditNote(InvoiceFields),
    ProForma(InvoiceFields),
    Bill(BillFields),
    Receipt(ReceiptFields),
    Expense(ExpenseFields),
    Unknown,
}

impl DocumentFields {
    /// Empty field set for a document type.
    pub fn empty(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::Invoice => Self::Invoice(InvoiceFields::default()),
            DocumentType::CreditNote => Self::CreditNote(InvoiceFields::default()),
            DocumentType::ProForma => Self::ProForma(InvoiceFields::default()),
            DocumentType::Bill => Self::Bill(BillFields::default()),
            DocumentType::Receipt => Self::Receipt(ReceiptFields::default()),
            DocumentType::Expense => Self::Expense(ExpenseFields::default()),
            DocumentType::Unknown => Self::Unknown,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            Self::Invoice(_) => DocumentType::Invoice,
            Self::CreditNote(_) => DocumentType::CreditNote,
            Self::ProForma(_) => DocumentType::ProForma,
            Self::Bill(_) => DocumentType::Bill,
            Self::Receipt(_) => DocumentType::Receipt,
            Self::Expense(_) => DocumentType::Expense,
            Self::Unknown => DocumentType::Unknown,
        }
    }

    pub fn totals(&self) -> Option<&Totals> {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => Some(&f.totals),
            Self::Bill(f) => Some(&f.totals),
            Self::Receipt(f) => Some(&f.totals),
            Self::Expense(f) => Some(&f.totals),
            Self::Unknown => None,
        }
    }

    pub fn payment(&self) -> Option<&PaymentDetails> {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => Some(&f.payment),
            Self::Bill(f) => Some(&f.payment),
            Self::Receipt(_) | Self::Expense(_) | Self::Unknown => None,
        }
    }

    pub fn line_items(&self) -> &[LineItem] {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => &f.line_items,
            Self::Bill(f) => &f.line_items,
            Self::Receipt(f) => &f.line_items,
            Self::Expense(_) | Self::Unknown => &[],
        }
    }

    /// The party that issued the document, with its field prefix.
    pub fn issuer(&self) -> Option<(&'static str, &Party)> {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => Some(("vendor", &f.vendor)),
            Self::Bill(f) => Some(("supplier", &f.supplier)),
            Self::Receipt(f) => Some(("merchant", &f.merchant)),
            Self::Expense(f) => Some(("merchant", &f.merchant)),
            Self::Unknown => None,
        }
    }

    /// Every party block on the document, with its field prefix.
    pub fn parties(&self) -> Vec<(&'static str, &Party)> {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => {
                vec![("vendor", &f.vendor), ("client", &f.client)]
            }
            _ => self.issuer().into_iter().collect(),
        }
    }

    /// Field name and value of the date that books the document.
    pub fn document_date(&self) -> (&'static str, Option<&str>) {
        match self {
            Self::Invoice(f) | Self::CreditNote(f) | Self::ProForma(f) => {
                ("issue_date", f.issue_date.as_deref())
            }
            Self::Bill(f) => ("issue_date", f.issue_date.as_deref()),
            Self::Receipt(f) => ("transaction_date", f.transaction_date.as_deref()),
            Self::Expense(f) => ("expense_date", f.expense_date.as_deref()),
            Self::Unknown => ("issue_date", None),
        }
    }
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPayload {
    pub fields: DocumentFields,
    /// Model's self-assessed reliability for this attempt, in [0, 1].
    pub confidence: f32,
    /// Full OCR transcription.
    pub extracted_text: String,
    #[serde(default)]
    pub provenance: BTreeMap<String, FieldProvenance>,
}

impl ExtractedPayload {
    /// Zero-confidence payload used when extraction could not run.
    pub fn empty(document_type: DocumentType) -> Self {
        Self {
            fields: DocumentFields::empty(document_type),
            confidence: 0.0,
            extracted_text: String::new(),
            provenance: BTreeMap::new(),
        }
    }

    /// True for the sentinel produced by a failed extraction.
    pub fn is_empty_sentinel(&self) -> bool {
        self.confidence == 0.0
            && self.extracted_text.is_empty()
            && self.fields == DocumentFields::empty(self.document_type())
    }

    pub fn document_type(&self) -> DocumentType {
        self.fields.document_type()
    }

    pub fn totals(&self) -> Option<&Totals> {
        self.fields.totals()
    }

    pub fn payment(&self) -> Option<&PaymentDetails> {
        self.fields.payment()
    }

    /// Flatten all present field values into dotted paths
    /// (`vendor.name`, `totals.total_amount`, `line_items.0.total`).
    pub fn field_values(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Ok(serde_json::Value::Object(root)) = serde_json::to_value(&self.fields) {
            if let Some(fields) = root.get("fields") {
                flatten_value("", fields, &mut out);
            }
        }
        out
    }
}

fn flatten_value(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                flatten_value(&join(k), v, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_value(&join(&i.to_string()), v, out);
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
