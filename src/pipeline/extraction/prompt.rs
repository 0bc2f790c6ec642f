use super::schema::response_template;
use crate::models::{DocumentType, ExtractedPayload};

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a data extraction assistant for Belgian accounting documents. Your
ONLY role is to copy the values printed on the document into a fixed JSON
structure. You never compute, complete or correct values.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Extract ONLY what is printed. A missing value is null, never a guess.
2. Dates as YYYY-MM-DD. Belgian documents write day first: 03/04/2024 is 3 April.
3. Amounts as plain decimal strings with a dot: "1.234,56" becomes "1234.56".
   Never output numbers, always strings.
4. VAT rates as "NN%". "Reverse charge", "Autoliquidation", "Intracommunautaire",
   "Medecontractant" and "BTW verlegd" mean "0%".
5. IBAN without spaces or dashes, upper case. Copy it character by character.
6. Structured communication exactly as printed: +++XXX/XXXX/XXXXX+++.
7. VAT numbers with their country prefix (BE0123456789).
8. For each value you are unsure of, lower its field_confidence.
9. confidence is your overall reliability for this extraction, 0.0 to 1.0.

OUTPUT: a single JSON object, no prose.
"#;

/// User message for one extraction attempt.
///
/// `reference` is a prior, trusted extraction from the same vendor used as a
/// layout anchor. `hints` are audit findings from a previous attempt.
pub fn build_extraction_prompt(
    document_type: DocumentType,
    reference: Option<&ExtractedPayload>,
    hints: &[String],
) -> String {
    let mut prompt = format!(
        "Extract the {} shown in the attached images into this JSON structure:\n\n{}\n",
        document_label(document_type),
        response_template(document_type)
    );

    if let Some(example) = reference {
        if let Ok(fields) = serde_json::to_string_pretty(&example.fields) {
            prompt.push_str(
                "\nA previous document from the same vendor was extracted as below. \
                 Use it to recognise the layout only. Every value must come from the \
                 CURRENT document.\n<reference>\n",
            );
            prompt.push_str(&fields);
            prompt.push_str("\n</reference>\n");
        }
    }

    if !hints.is_empty() {
        prompt.push_str(
            "\nA previous reading of this document failed these checks. \
             Re-read the concerned fields carefully:\n",
        );
        for hint in hints {
            prompt.push_str("- ");
            prompt.push_str(hint);
            prompt.push('\n');
        }
    }

    prompt
}

fn document_label(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Invoice => "sales invoice",
        DocumentType::Bill => "purchase invoice",
        DocumentType::CreditNote => "credit note",
        DocumentType::ProForma => "pro-forma invoice",
        DocumentType::Receipt => "receipt",
        DocumentType::Expense => "expense slip",
        DocumentType::Unknown => "document",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt_has_template_only() {
        let prompt = build_extraction_prompt(DocumentType::Bill, None, &[]);
        assert!(prompt.contains("purchase invoice"));
        assert!(prompt.contains("\"supplier\""));
        assert!(!prompt.contains("<reference>"));
        assert!(!prompt.contains("failed these checks"));
    }

    #[test]
    fn reference_example_is_embedded() {
        let reference = ExtractedPayload::empty(DocumentType::Invoice);
        let prompt = build_extraction_prompt(DocumentType::Invoice, Some(&reference), &[]);
        assert!(prompt.contains("<reference>"));
        assert!(prompt.contains("\"document_type\": \"invoice\""));
    }

    #[test]
    fn hints_are_listed() {
        let hints = vec![
            "Re-read the IBAN carefully".to_string(),
            "Check the total amount".to_string(),
        ];
        let prompt = build_extraction_prompt(DocumentType::Invoice, None, &hints);
        assert!(prompt.contains("- Re-read the IBAN carefully\n"));
        assert!(prompt.contains("- Check the total amount\n"));
    }
}
