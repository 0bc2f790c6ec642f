pub mod normalize;
pub mod parser;
pub mod prompt;
pub mod schema;

pub use normalize::*;
pub use parser::*;
pub use prompt::*;
pub use schema::*;

use std::sync::Arc;

use super::ports::{DocumentImage, InferenceClient, InferenceRequest};
use crate::models::{DocumentType, ExtractedPayload};

/// Extraction stage. Never fails: an invocation error or unreadable output
/// yields the zero-confidence sentinel from `ExtractedPayload::empty`.
pub struct Extractor {
    client: Arc<dyn InferenceClient>,
}

impl Extractor {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub async fn extract(
        &self,
        images: &[DocumentImage],
        document_type: DocumentType,
        reference: Option<&ExtractedPayload>,
        hints: &[String],
    ) -> ExtractedPayload {
        if document_type == DocumentType::Unknown || images.is_empty() {
            return ExtractedPayload::empty(document_type);
        }

        let user_content = build_extraction_prompt(document_type, reference, hints);
        let raw = match self
            .client
            .invoke(InferenceRequest {
                system_prompt: EXTRACTION_SYSTEM_PROMPT,
                user_content: &user_content,
                images,
            })
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    model = self.client.model_name(),
                    document_type = %document_type,
                    error = %e,
                    "Extraction inference failed, returning empty payload"
                );
                return ExtractedPayload::empty(document_type);
            }
        };

        match parse_extraction_response(&raw, document_type) {
            Ok(payload) => {
                tracing::debug!(
                    model = self.client.model_name(),
                    confidence = payload.confidence,
                    provenance = payload.provenance.len(),
                    "Extraction parsed"
                );
                payload
            }
            Err(e) => {
                tracing::warn!(
                    model = self.client.model_name(),
                    error = %e,
                    "Unreadable extraction output, returning empty payload"
                );
                ExtractedPayload::empty(document_type)
            }
        }
    }
}
