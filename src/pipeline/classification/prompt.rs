use crate::pipeline::ports::TenantContext;

pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"
You are a document classifier for Belgian small businesses. Your ONLY role is
to decide what kind of business document the images show. You do not extract
amounts and you do not give accounting advice.

TAXONOMY (closed, use exactly one value):
- invoice       a sales invoice ISSUED BY the company you work for
- bill          a purchase invoice RECEIVED BY the company you work for
- credit_note   a credit note / note de crédit / creditnota / avoir
- pro_forma     a pro-forma, quote, devis, offerte
- receipt       a till receipt / ticket de caisse / kasticket, already paid
- expense       an expense slip / note de frais / onkostennota
- unknown       none of the above, or unreadable

REASON STEP BY STEP:
1. Detect the document language (fr, nl, en, de).
2. Read the title and match keywords: Facture/Factuur/Invoice, Note de crédit/
   Creditnota, Pro forma/Devis/Offerte, Ticket/Kasticket/Reçu.
3. Identify the SENDER block (who issued the document, usually top-left with
   logo, VAT number, bank details) and the RECIPIENT block (billed to).
4. Detect the payment state: unpaid (due date, payment instructions,
   structured communication +++xxx/xxxx/xxxxx+++) or paid (cash, card,
   "payé", "betaald").
5. Route to a subtype from the keywords and payment state.

RULES:
1. Report what is written. If the sender or recipient is not readable, use null.
2. Never guess a VAT number. Copy it exactly as printed.
3. Confidence is a number between 0.0 and 1.0.

OUTPUT: a single JSON object, no prose:
{
  "language": "fr | nl | en | de",
  "title": "document title as printed, or null",
  "sender": {"name": "name or null", "vat_number": "VAT or null"},
  "recipient": {"name": "name or null", "vat_number": "VAT or null"},
  "payment_state": "unpaid | paid | unknown",
  "document_type": "invoice | bill | credit_note | pro_forma | receipt | expense | unknown",
  "confidence": 0.0,
  "reasoning": "one or two sentences"
}
"#;

/// User message for one classification call. The tenant block lets the
/// model tell an issued invoice from a received bill.
pub fn build_classification_prompt(tenant: &TenantContext) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"You are classifying a document for this company:
<company>
name: {name}
vat_number: {vat}
address: {address}
</company>

If this company is the SENDER of an invoice, the type is "invoice".
If this company is the RECIPIENT of an invoice, the type is "bill".

Classify the attached document images."#,
        name = field(&tenant.company_name),
        vat = field(&tenant.vat_number),
        address = field(&tenant.address),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_type() {
        for t in [
            "invoice",
            "bill",
            "credit_note",
            "pro_forma",
            "receipt",
            "expense",
            "unknown",
        ] {
            assert!(CLASSIFICATION_SYSTEM_PROMPT.contains(t), "{t}");
        }
    }

    #[test]
    fn prompt_carries_tenant_identity() {
        let tenant = TenantContext {
            vat_number: Some("BE0999888777".into()),
            company_name: Some("Studio Lumen".into()),
            ..Default::default()
        };
        let prompt = build_classification_prompt(&tenant);
        assert!(prompt.contains("BE0999888777"));
        assert!(prompt.contains("Studio Lumen"));
        assert!(prompt.contains("address: unknown"));
    }
}
