use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::checksum::vat_numbers_match;
use super::ports::{
    BusinessRegistry, Enricher, Enrichment, PortError, RegistryEntry, TenantContext,
};
use crate::models::{ExtractedPayload, Party};

/// Fixed in-memory company registry.
pub struct StaticRegistry {
    entries: Vec<RegistryEntry>,
    unavailable: bool,
    lookups: AtomicUsize,
}

impl StaticRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self {
            entries,
            unavailable: false,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A registry whose every lookup fails.
    pub fn unavailable() -> Self {
        Self {
            entries: Vec::new(),
            unavailable: true,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BusinessRegistry for StaticRegistry {
    async fn lookup_company(
        &self,
        vat_number: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<RegistryEntry>, PortError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.unavailable {
            return Err(PortError::Unavailable("business registry".into()));
        }

        // VAT number is authoritative; name is the fallback key.
        if let Some(vat) = vat_number {
            return Ok(self
                .entries
                .iter()
                .find(|e| vat_numbers_match(&e.vat_number, vat))
                .cloned());
        }
        Ok(name.and_then(|name| {
            let wanted = name.trim().to_lowercase();
            self.entries
                .iter()
                .find(|e| e.name.to_lowercase() == wanted)
                .cloned()
        }))
    }
}

/// Resolves the document's counterparty (the party that is not the tenant)
/// through the business registry.
pub struct RegistryEnricher {
    registry: Arc<dyn BusinessRegistry>,
}

impl RegistryEnricher {
    pub fn new(registry: Arc<dyn BusinessRegistry>) -> Self {
        Self { registry }
    }
}

fn is_tenant(tenant: &TenantContext, party: &Party) -> bool {
    let vat_match = match (&tenant.vat_number, &party.vat_number) {
        (Some(t), Some(p)) => vat_numbers_match(t, p),
        _ => false,
    };
    let name_match = match (&tenant.company_name, &party.name) {
        (Some(t), Some(p)) => t.trim().eq_ignore_ascii_case(p.trim()),
        _ => false,
    };
    vat_match || name_match
}

#[async_trait]
impl Enricher for RegistryEnricher {
    async fn enrich(
        &self,
        tenant: &TenantContext,
        payload: &ExtractedPayload,
    ) -> Result<Enrichment, PortError> {
        let counterparty = payload
            .fields
            .parties()
            .into_iter()
            .map(|(_, party)| party)
            .find(|party| party.is_identified() && !is_tenant(tenant, party));

        let Some(party) = counterparty else {
            return Ok(Enrichment::default());
        };

        let entry = self
            .registry
            .lookup_company(party.vat_number.as_deref(), party.name.as_deref())
            .await?;
        if entry.is_none() {
            tracing::debug!(
                vat = party.vat_number.as_deref().unwrap_or("-"),
                "Counterparty not found in registry"
            );
        }
        Ok(Enrichment {
            counterparty: entry,
        })
    }
}
