//! Capability ports for the collaborators the pipeline calls out to.
//!
//! Every port is async and object-safe so the processor can hold them as
//! `Arc<dyn …>` and serve many documents concurrently:
//! - InferenceClient: vision/LLM model invocation (classification, extraction)
//! - BusinessRegistry: company lookup by VAT number or name
//! - VendorExampleStore: few-shot examples per tenant and vendor
//! - Enricher: post-judgment enrichment of an accepted payload

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DocumentType, ExtractedPayload};

/// One page image of the document being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentImage {
    pub page_number: u32,
    pub bytes: Vec<u8>,
}

impl DocumentImage {
    pub fn new(page_number: u32, bytes: Vec<u8>) -> Self {
        Self { page_number, bytes }
    }
}

/// The company the document is processed for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub vat_number: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
}

// ═══════════════════════════════════════════
// Inference
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    pub system_prompt: &'a str,
    pub user_content: &'a str,
    pub images: &'a [DocumentImage],
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Inference service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
}

/// Model invocation returning the raw model output text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Name of the model behind this client (for the audit trail).
    fn model_name(&self) -> &str;

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError>;
}

// ═══════════════════════════════════════════
// Registry, example store, enrichment
// ═══════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator rejected the request: {0}")]
    Rejected(String),
}

/// A company as known to the business registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub vat_number: String,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
}

#[async_trait]
pub trait BusinessRegistry: Send + Sync {
    /// `Ok(None)` is a legitimate "not found".
    async fn lookup_company(
        &self,
        vat_number: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<RegistryEntry>, PortError>;
}

/// A prior, trusted extraction used as a formatting anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorExample {
    pub tenant_id: Uuid,
    pub document_type: DocumentType,
    pub vendor_vat: Option<String>,
    pub payload: ExtractedPayload,
    pub created_at: DateTime<Utc>,
}

/// Append/read store. Nothing here updates an example in place.
#[async_trait]
pub trait VendorExampleStore: Send + Sync {
    async fn find(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
        vendor_vat: Option<&str>,
    ) -> Result<Option<VendorExample>, PortError>;

    async fn save(&self, example: VendorExample) -> Result<(), PortError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Registry record of the other party on the document, when resolved.
    pub counterparty: Option<RegistryEntry>,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(
        &self,
        tenant: &TenantContext,
        payload: &ExtractedPayload,
    ) -> Result<Enrichment, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ports are held as trait objects by the processor.
    #[test]
    fn ports_are_object_safe() {
        fn _assert_inference(_: &dyn InferenceClient) {}
        fn _assert_registry(_: &dyn BusinessRegistry) {}
        fn _assert_store(_: &dyn VendorExampleStore) {}
        fn _assert_enricher(_: &dyn Enricher) {}
    }

    #[test]
    fn inference_errors_render() {
        assert_eq!(
            InferenceError::Timeout(30).to_string(),
            "Inference request timed out after 30s"
        );
        assert!(InferenceError::Status {
            status: 503,
            body: "busy".into()
        }
        .to_string()
        .contains("503"));
    }
}
