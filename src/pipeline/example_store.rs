use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::checksum::vat_numbers_match;
use super::ports::{PortError, VendorExample, VendorExampleStore};
use crate::models::DocumentType;

/// Append-only in-process example store.
///
/// `find` returns the most recently saved example for the tenant, document
/// type and vendor. An example saved without a vendor VAT only answers
/// lookups that also carry none.
#[derive(Default)]
pub struct InMemoryExampleStore {
    examples: RwLock<Vec<VendorExample>>,
    reject_writes: bool,
}

impl InMemoryExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `save` always fails.
    pub fn read_only() -> Self {
        Self {
            examples: RwLock::new(Vec::new()),
            reject_writes: true,
        }
    }

    pub fn with_examples(examples: Vec<VendorExample>) -> Self {
        Self {
            examples: RwLock::new(examples),
            reject_writes: false,
        }
    }

    pub async fn len(&self) -> usize {
        self.examples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.examples.read().await.is_empty()
    }
}

#[async_trait]
impl VendorExampleStore for InMemoryExampleStore {
    async fn find(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
        vendor_vat: Option<&str>,
    ) -> Result<Option<VendorExample>, PortError> {
        let examples = self.examples.read().await;
        let found = examples
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && e.document_type == document_type)
            .find(|e| match (vendor_vat, e.vendor_vat.as_deref()) {
                (Some(wanted), Some(stored)) => vat_numbers_match(wanted, stored),
                (None, None) => true,
                _ => false,
            })
            .cloned();
        Ok(found)
    }

    async fn save(&self, example: VendorExample) -> Result<(), PortError> {
        if self.reject_writes {
            return Err(PortError::Rejected("example store is read-only".into()));
        }
        self.examples.write().await.push(example);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedPayload;
    use chrono::{Duration, Utc};

    fn example(tenant: Uuid, vat: Option<&str>, confidence: f32) -> VendorExample {
        let mut payload = ExtractedPayload::empty(DocumentType::Invoice);
        payload.confidence = confidence;
        VendorExample {
            tenant_id: tenant,
            document_type: DocumentType::Invoice,
            vendor_vat: vat.map(str::to_string),
            payload,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn finds_by_tenant_type_and_vendor() {
        let tenant = Uuid::new_v4();
        let store = InMemoryExampleStore::new();
        store.save(example(tenant, Some("BE0123456789"), 0.9)).await.unwrap();

        let hit = store
            .find(tenant, DocumentType::Invoice, Some("BE 0123.456.789"))
            .await
            .unwrap();
        assert!(hit.is_some());

        let other_type = store
            .find(tenant, DocumentType::Bill, Some("BE0123456789"))
            .await
            .unwrap();
        assert!(other_type.is_none());

        let other_tenant = store
            .find(Uuid::new_v4(), DocumentType::Invoice, Some("BE0123456789"))
            .await
            .unwrap();
        assert!(other_tenant.is_none());
    }

    #[tokio::test]
    async fn most_recent_example_wins() {
        let tenant = Uuid::new_v4();
        let mut older = example(tenant, Some("BE0123456789"), 0.91);
        older.created_at = Utc::now() - Duration::days(3);
        let newer = example(tenant, Some("BE0123456789"), 0.97);
        let store = InMemoryExampleStore::with_examples(vec![older, newer]);

        let hit = store
            .find(tenant, DocumentType::Invoice, Some("BE0123456789"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.payload.confidence, 0.97);
    }

    #[tokio::test]
    async fn vendorless_lookup_only_matches_vendorless_examples() {
        let tenant = Uuid::new_v4();
        let store = InMemoryExampleStore::with_examples(vec![example(
            tenant,
            Some("BE0123456789"),
            0.9,
        )]);
        assert!(store
            .find(tenant, DocumentType::Invoice, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn read_only_store_rejects_writes() {
        let store = InMemoryExampleStore::read_only();
        let result = store.save(example(Uuid::new_v4(), None, 0.9)).await;
        assert!(matches!(result, Err(PortError::Rejected(_))));
        assert!(store.is_empty().await);
    }
}
