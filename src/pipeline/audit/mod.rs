pub mod checks;

pub use checks::*;

use std::sync::Arc;

use super::ports::BusinessRegistry;
use crate::models::{AuditReport, ExtractedPayload};

/// Model-free checks of one payload, in a fixed order: totals, line sums,
/// VAT breakdown, line arithmetic, VAT rates, IBAN, payment reference.
pub fn audit_payload(payload: &ExtractedPayload) -> AuditReport {
    let mut checks = vec![check_totals(payload)];
    checks.extend(check_line_items_sum(payload));
    checks.extend(check_vat_breakdown(payload));
    checks.extend(check_line_arithmetic(payload));
    checks.extend(check_vat_rates(payload));
    checks.push(check_iban(payload));
    checks.push(check_payment_reference(payload));
    AuditReport::new(checks)
}

/// Audit engine: the deterministic checks plus optional registry lookups.
pub struct AuditEngine {
    registry: Option<Arc<dyn BusinessRegistry>>,
}

impl AuditEngine {
    /// Engine without a business registry (company checks are not run).
    pub fn new() -> Self {
        Self { registry: None }
    }

    pub fn with_registry(registry: Arc<dyn BusinessRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Audit a payload. A registry error is treated as "not found": the
    /// company check fails as a Warning and the audit carries on.
    pub async fn audit(&self, payload: &ExtractedPayload) -> AuditReport {
        let mut report = audit_payload(payload);

        let Some(registry) = &self.registry else {
            return report;
        };

        for (prefix, party) in registry_parties(&payload.fields) {
            let entry = match registry
                .lookup_company(party.vat_number.as_deref(), party.name.as_deref())
                .await
            {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(party = prefix, error = %e, "Registry lookup failed");
                    None
                }
            };
            report
                .checks
                .extend(check_registry_party(prefix, party, entry.as_ref()));
        }

        report
    }
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuditStatus, CheckType, DocumentFields, DocumentType, InvoiceFields, Party,
        PaymentDetails, Totals,
    };
    use crate::pipeline::ports::RegistryEntry;
    use crate::pipeline::registry::StaticRegistry;

    fn scenario_invoice() -> ExtractedPayload {
        let mut p = ExtractedPayload::empty(DocumentType::Invoice);
        p.fields = DocumentFields::Invoice(InvoiceFields {
            vendor: Party {
                name: Some("Acme BV".into()),
                vat_number: Some("BE0123456789".into()),
                address: None,
            },
            issue_date: Some("2024-03-15".into()),
            totals: Totals {
                subtotal: Some("1240.00".into()),
                total_vat_amount: Some("260.00".into()),
                total_amount: Some("1500.00".into()),
                currency: Some("EUR".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        p.confidence = 0.92;
        p
    }

    fn acme() -> RegistryEntry {
        RegistryEntry {
            vat_number: "BE0123456789".into(),
            name: "Acme BV".into(),
            address: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn clean_invoice_passes() {
        let report = AuditEngine::new().audit(&scenario_invoice()).await;
        assert_eq!(report.overall_status(), AuditStatus::Passed);

        let math = report
            .checks
            .iter()
            .find(|c| c.check_type == CheckType::Math)
            .unwrap();
        assert!(math.passed);

        let iban = report
            .checks
            .iter()
            .find(|c| c.check_type == CheckType::ChecksumIban)
            .unwrap();
        assert!(iban.passed);
        assert_eq!(iban.message, "No IBAN present");
    }

    #[test]
    fn audit_is_idempotent() {
        let payload = scenario_invoice();
        assert_eq!(audit_payload(&payload), audit_payload(&payload));
    }

    #[tokio::test]
    async fn bad_iban_fails_the_report() {
        let mut payload = scenario_invoice();
        if let DocumentFields::Invoice(f) = &mut payload.fields {
            f.payment = PaymentDetails {
                iban: Some("BE68539007547035".into()),
                ..Default::default()
            };
        }
        let report = AuditEngine::new().audit(&payload).await;
        assert_eq!(report.overall_status(), AuditStatus::Failed);
        assert_eq!(report.failure_hints().len(), 1);
        assert_eq!(report.failed_fields(), vec!["payment.iban"]);
    }

    #[tokio::test]
    async fn registry_checks_per_identified_party() {
        let registry = Arc::new(StaticRegistry::new(vec![acme()]));
        let engine = AuditEngine::with_registry(registry.clone());

        let report = engine.audit(&scenario_invoice()).await;
        // Client block is empty, so only the vendor is looked up.
        assert_eq!(registry.lookup_count(), 1);
        assert!(report
            .checks
            .iter()
            .any(|c| c.check_type == CheckType::CompanyExists && c.passed));
        assert_eq!(report.overall_status(), AuditStatus::Passed);
    }

    #[tokio::test]
    async fn registry_outage_degrades_to_warning() {
        let engine = AuditEngine::with_registry(Arc::new(StaticRegistry::unavailable()));
        let report = engine.audit(&scenario_invoice()).await;
        assert_eq!(report.overall_status(), AuditStatus::WarningsOnly);
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn sentinel_payload_has_no_failures() {
        let report = AuditEngine::new()
            .audit(&ExtractedPayload::empty(DocumentType::Invoice))
            .await;
        assert_eq!(report.failed_count(), 0);
    }
}
