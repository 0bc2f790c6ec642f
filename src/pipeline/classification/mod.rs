pub mod direction;
pub mod parser;
pub mod prompt;

pub use direction::*;
pub use parser::*;
pub use prompt::*;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ports::{DocumentImage, InferenceClient, InferenceError, InferenceRequest, TenantContext};
use super::response::ResponseError;
use crate::models::DocumentType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("No document images to classify")]
    NoImages,

    #[error("Classification inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Unreadable classification response: {0}")]
    Response(#[from] ResponseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_type: DocumentType,
    pub confidence: f32,
    pub reasoning: String,
    pub language: Option<String>,
    /// VAT number read from the sender block, used for vendor example lookup.
    pub sender_vat: Option<String>,
}

/// Classification stage: one inference call, no internal retry.
pub struct Classifier {
    client: Arc<dyn InferenceClient>,
}

impl Classifier {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub async fn classify(
        &self,
        images: &[DocumentImage],
        tenant: &TenantContext,
    ) -> Result<ClassificationResult, ClassificationError> {
        if images.is_empty() {
            return Err(ClassificationError::NoImages);
        }

        let user_content = build_classification_prompt(tenant);
        let raw = self
            .client
            .invoke(InferenceRequest {
                system_prompt: CLASSIFICATION_SYSTEM_PROMPT,
                user_content: &user_content,
                images,
            })
            .await?;

        let parsed = parse_classification_response(&raw)?;
        let (document_type, confidence, note) = resolve_direction(tenant, &parsed);

        let reasoning = match note {
            Some(note) if parsed.reasoning.is_empty() => note,
            Some(note) => format!("{} ({note})", parsed.reasoning),
            None => parsed.reasoning.clone(),
        };

        tracing::debug!(
            model_label = %parsed.document_type,
            resolved = %document_type,
            confidence,
            "Document classified"
        );

        Ok(ClassificationResult {
            document_type,
            confidence,
            reasoning,
            language: parsed.language,
            sender_vat: parsed
                .sender
                .vat_number
                .filter(|v| !v.trim().is_empty() && !v.eq_ignore_ascii_case("null")),
        })
    }
}
