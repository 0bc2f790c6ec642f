//! Document processing orchestrator.
//!
//! Single entry point that drives one document through the pipeline:
//! classify → example lookup → extract → audit → retry → consensus →
//! judge → enrich → index example.
//!
//! Every collaborator is a port held behind an `Arc`, so one processor can
//! serve many concurrent runs and stays testable with the scripted mocks.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::audit::AuditEngine;
use super::classification::Classifier;
use super::consensus;
use super::extraction::{missing_essential_fields, Extractor};
use super::judgment::JudgmentEngine;
use super::ollama::OllamaClient;
use super::ports::{
    BusinessRegistry, DocumentImage, Enricher, Enrichment, InferenceClient, InferenceError,
    TenantContext, VendorExample, VendorExampleStore,
};
use super::retry::RetryController;
use super::trail::{ProcessingStep, ProcessingTrail};
use crate::config::PipelineConfig;
use crate::models::{
    AuditReport, ConsensusReport, DecisionOutcome, DocumentType, ExtractedPayload,
    JudgmentContext, JudgmentDecision, ProcessingStage, RetryResult,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Stage failures are reported as `ProcessingResult::Failed`; the only error
/// is an aborted run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("Processing cancelled during {stage}")]
    Cancelled { stage: ProcessingStage },
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Terminal result of one run. Every variant carries the step trail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingResult {
    Success {
        document_id: Uuid,
        payload: ExtractedPayload,
        audit_report: AuditReport,
        decision: JudgmentDecision,
        enrichment: Enrichment,
        trail: Vec<ProcessingStep>,
    },
    /// Partial extraction plus the issues a reviewer has to resolve.
    NeedsReview {
        document_id: Uuid,
        payload: ExtractedPayload,
        audit_report: Option<AuditReport>,
        decision: Option<JudgmentDecision>,
        issues: Vec<String>,
        trail: Vec<ProcessingStep>,
    },
    Failed {
        document_id: Uuid,
        stage: ProcessingStage,
        reason: String,
        decision: Option<JudgmentDecision>,
        trail: Vec<ProcessingStep>,
    },
}

impl ProcessingResult {
    pub fn document_id(&self) -> Uuid {
        match self {
            Self::Success { document_id, .. }
            | Self::NeedsReview { document_id, .. }
            | Self::Failed { document_id, .. } => *document_id,
        }
    }

    pub fn trail(&self) -> &[ProcessingStep] {
        match self {
            Self::Success { trail, .. }
            | Self::NeedsReview { trail, .. }
            | Self::Failed { trail, .. } => trail,
        }
    }

    pub fn decision(&self) -> Option<&JudgmentDecision> {
        match self {
            Self::Success { decision, .. } => Some(decision),
            Self::NeedsReview { decision, .. } | Self::Failed { decision, .. } => {
                decision.as_ref()
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    classifier: Classifier,
    extractor: Arc<Extractor>,
    expert: Option<Extractor>,
    audit: Arc<AuditEngine>,
    judgment: JudgmentEngine,
    examples: Option<Arc<dyn VendorExampleStore>>,
    enricher: Option<Arc<dyn Enricher>>,
    config: PipelineConfig,
}

impl DocumentProcessor {
    pub fn new(
        classification_client: Arc<dyn InferenceClient>,
        extraction_client: Arc<dyn InferenceClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier: Classifier::new(classification_client),
            extractor: Arc::new(Extractor::new(extraction_client)),
            expert: None,
            audit: Arc::new(AuditEngine::new()),
            judgment: JudgmentEngine::new(config.judgment.clone()),
            examples: None,
            enricher: None,
            config,
        }
    }

    /// Processor backed by Ollama for every model named in `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self, InferenceError> {
        let inference = &config.inference;
        let classification: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(
            &inference.base_url,
            &inference.classification_model,
            inference.timeout_secs,
        )?);
        let extraction: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(
            &inference.base_url,
            &inference.extraction_model,
            inference.timeout_secs,
        )?);
        let expert = match &config.consensus.expert_model {
            Some(model) => Some(Arc::new(OllamaClient::new(
                &inference.base_url,
                model,
                inference.timeout_secs,
            )?)),
            None => None,
        };

        let processor = Self::new(classification, extraction, config);
        Ok(match expert {
            Some(client) => processor.with_expert(client),
            None => processor,
        })
    }

    /// Second extraction model for multi-model consensus.
    pub fn with_expert(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.expert = Some(Extractor::new(client));
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn BusinessRegistry>) -> Self {
        self.audit = Arc::new(AuditEngine::with_registry(registry));
        self
    }

    pub fn with_example_store(mut self, store: Arc<dyn VendorExampleStore>) -> Self {
        self.examples = Some(store);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for one document.
    ///
    /// Stage failures come back as `ProcessingResult::Failed`. `Err` only
    /// when `cancel` fires; nothing is written to the example store after
    /// that point.
    #[tracing::instrument(
        name = "process_document",
        skip_all,
        fields(document_id = %document_id, tenant_id = %tenant.tenant_id)
    )]
    pub async fn process(
        &self,
        images: &[DocumentImage],
        tenant: &TenantContext,
        document_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ProcessingResult, ProcessorError> {
        let mut trail = ProcessingTrail::new();

        // Step 1: Classification
        let started = Instant::now();
        let classified = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Classification)),
            r = self.classifier.classify(images, tenant) => r,
        };
        let classification = match classified {
            Ok(c) => c,
            Err(e) => {
                trail.record(
                    "classify",
                    self.classifier.model_name(),
                    started,
                    Some(e.to_string()),
                );
                tracing::warn!(error = %e, "Classification failed");
                return Ok(failed(
                    document_id,
                    ProcessingStage::Classification,
                    e.to_string(),
                    None,
                    trail,
                ));
            }
        };
        trail.record(
            "classify",
            self.classifier.model_name(),
            started,
            Some(format!(
                "{} ({:.2})",
                classification.document_type, classification.confidence
            )),
        );

        let document_type = classification.document_type;
        if document_type == DocumentType::Unknown {
            return Ok(failed(
                document_id,
                ProcessingStage::Classification,
                format!(
                    "Document type could not be determined: {}",
                    classification.reasoning
                ),
                None,
                trail,
            ));
        }

        // Step 2: Vendor example lookup
        let vendor_vat = classification.sender_vat.as_deref();
        let reference = self
            .find_example(tenant, document_type, vendor_vat, cancel, &mut trail)
            .await?;

        // Step 3: Extraction
        let started = Instant::now();
        let payload = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Extraction)),
            p = self.extractor.extract(images, document_type, reference.as_ref(), &[]) => p,
        };
        trail.record(
            "extract",
            self.extractor.model_name(),
            started,
            Some(format!("confidence {:.2}", payload.confidence)),
        );

        if payload.is_empty_sentinel() {
            tracing::warn!(document_type = %document_type, "Extraction produced no data");
            return Ok(ProcessingResult::NeedsReview {
                document_id,
                payload,
                audit_report: None,
                decision: None,
                issues: vec!["Extraction returned no data".to_string()],
                trail: trail.into_steps(),
            });
        }

        // Step 4: Audit
        let started = Instant::now();
        let report = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Validation)),
            r = self.audit.audit(&payload) => r,
        };
        trail.record(
            "audit",
            "audit_engine",
            started,
            Some(format!(
                "{} ({}/{} passed)",
                report.overall_status(),
                report.passed_count(),
                report.checks.len()
            )),
        );

        // Step 5: Self-correction
        let needs_retry = !report.is_valid();
        let started = Instant::now();
        let mut retry = RetryController::new(
            self.extractor.clone(),
            self.audit.clone(),
            self.config.retry.max_retries,
        );
        if !self.config.retry.inject_hints {
            retry = retry.without_hints();
        }
        let outcome = retry
            .attempt_correction(
                images,
                document_type,
                reference.as_ref(),
                payload,
                report,
                cancel,
            )
            .await
            .map_err(|_| cancelled(ProcessingStage::Validation))?;
        if needs_retry {
            trail.record(
                "retry",
                self.extractor.model_name(),
                started,
                Some(retry_note(&outcome.result)),
            );
        }
        let payload = outcome.payload;
        let report = outcome.report;

        // Step 6: Consensus
        let consensus_report = self
            .run_consensus(images, document_type, reference.as_ref(), &payload, cancel, &mut trail)
            .await?;

        // Step 7: Judgment
        let started = Instant::now();
        let missing: Vec<String> = missing_essential_fields(&payload)
            .into_iter()
            .map(str::to_string)
            .collect();
        let context = JudgmentContext {
            has_essential_fields: missing.is_empty(),
            missing_essential_fields: missing,
            document_type,
            audit_report: report.clone(),
            retry_result: Some(outcome.result),
            extraction_confidence: payload.confidence,
            consensus_report,
        };
        let decision = self.judgment.evaluate(&context);
        trail.record(
            "judge",
            "judgment_engine",
            started,
            Some(format!("{} ({:.2})", decision.outcome, decision.confidence)),
        );

        let verdict = decision.outcome;
        match verdict {
            DecisionOutcome::Reject => {
                return Ok(failed(
                    document_id,
                    ProcessingStage::Validation,
                    decision.reasoning.clone(),
                    Some(decision),
                    trail,
                ));
            }
            DecisionOutcome::NeedsReview => {
                return Ok(ProcessingResult::NeedsReview {
                    document_id,
                    payload,
                    audit_report: Some(report),
                    issues: decision.issues.clone(),
                    decision: Some(decision),
                    trail: trail.into_steps(),
                });
            }
            DecisionOutcome::AutoApprove => {}
        }

        // Step 8: Enrichment
        let enrichment = match &self.enricher {
            Some(enricher) => {
                let started = Instant::now();
                let enriched = tokio::select! {
                    _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Enrichment)),
                    r = enricher.enrich(tenant, &payload) => r,
                };
                match enriched {
                    Ok(enrichment) => {
                        let note = enrichment
                            .counterparty
                            .as_ref()
                            .map(|c| format!("counterparty {}", c.vat_number))
                            .unwrap_or_else(|| "no counterparty".to_string());
                        trail.record("enrich", "enricher", started, Some(note));
                        enrichment
                    }
                    Err(e) => {
                        trail.record("enrich", "enricher", started, Some(e.to_string()));
                        tracing::warn!(error = %e, "Enrichment failed");
                        return Ok(failed(
                            document_id,
                            ProcessingStage::Enrichment,
                            e.to_string(),
                            Some(decision),
                            trail,
                        ));
                    }
                }
            }
            None => Enrichment::default(),
        };

        // Step 9: Index as vendor example
        self.index_example(tenant, &payload, &decision, cancel, &mut trail)
            .await;

        tracing::info!(
            document_type = %document_type,
            confidence = decision.confidence,
            steps = trail.len(),
            "Document auto-approved"
        );

        Ok(ProcessingResult::Success {
            document_id,
            payload,
            audit_report: report,
            decision,
            enrichment,
            trail: trail.into_steps(),
        })
    }

    async fn find_example(
        &self,
        tenant: &TenantContext,
        document_type: DocumentType,
        vendor_vat: Option<&str>,
        cancel: &CancellationToken,
        trail: &mut ProcessingTrail,
    ) -> Result<Option<ExtractedPayload>, ProcessorError> {
        let Some(store) = self.examples.as_ref().filter(|_| self.config.examples.enabled) else {
            return Ok(None);
        };

        let started = Instant::now();
        let found = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Extraction)),
            r = store.find(tenant.tenant_id, document_type, vendor_vat) => r,
        };
        let reference = match found {
            Ok(example) => example.map(|e| e.payload),
            Err(e) => {
                tracing::warn!(error = %e, "Vendor example lookup failed");
                None
            }
        };
        trail.record(
            "lookup_example",
            "example_store",
            started,
            Some(if reference.is_some() { "found" } else { "none" }.to_string()),
        );
        Ok(reference)
    }

    async fn run_consensus(
        &self,
        images: &[DocumentImage],
        document_type: DocumentType,
        reference: Option<&ExtractedPayload>,
        payload: &ExtractedPayload,
        cancel: &CancellationToken,
        trail: &mut ProcessingTrail,
    ) -> Result<Option<ConsensusReport>, ProcessorError> {
        let Some(expert) = &self.expert else {
            return Ok(None);
        };

        let started = Instant::now();
        let expert_payload = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(ProcessingStage::Extraction)),
            p = expert.extract(images, document_type, reference, &[]) => p,
        };

        if expert_payload.is_empty_sentinel() {
            trail.record(
                "consensus",
                expert.model_name(),
                started,
                Some("expert extraction unavailable".to_string()),
            );
            tracing::warn!("Expert extraction produced no data, skipping consensus");
            return Ok(None);
        }

        let report = consensus::compare(payload, &expert_payload);
        trail.record(
            "consensus",
            expert.model_name(),
            started,
            Some(format!(
                "{} conflict(s), {} critical",
                report.conflicts.len(),
                report.critical_conflicts().len()
            )),
        );
        Ok(Some(report))
    }

    /// Best-effort: a failed write is logged and dropped.
    async fn index_example(
        &self,
        tenant: &TenantContext,
        payload: &ExtractedPayload,
        decision: &JudgmentDecision,
        cancel: &CancellationToken,
        trail: &mut ProcessingTrail,
    ) {
        let Some(store) = self.examples.as_ref().filter(|_| self.config.examples.enabled) else {
            return;
        };
        if decision.confidence < self.config.examples.index_min_confidence {
            return;
        }

        let example = VendorExample {
            tenant_id: tenant.tenant_id,
            document_type: payload.document_type(),
            vendor_vat: payload
                .fields
                .issuer()
                .and_then(|(_, party)| party.vat_number.clone()),
            payload: payload.clone(),
            created_at: Utc::now(),
        };

        let started = Instant::now();
        let saved = tokio::select! {
            _ = cancel.cancelled() => return,
            r = store.save(example) => r,
        };
        let note = match saved {
            Ok(()) => "indexed".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Vendor example write failed");
                format!("not indexed: {e}")
            }
        };
        trail.record("index_example", "example_store", started, Some(note));
    }
}

fn cancelled(stage: ProcessingStage) -> ProcessorError {
    tracing::info!(stage = %stage, "Processing cancelled");
    ProcessorError::Cancelled { stage }
}

fn failed(
    document_id: Uuid,
    stage: ProcessingStage,
    reason: String,
    decision: Option<JudgmentDecision>,
    trail: ProcessingTrail,
) -> ProcessingResult {
    ProcessingResult::Failed {
        document_id,
        stage,
        reason,
        decision,
        trail: trail.into_steps(),
    }
}

fn retry_note(result: &RetryResult) -> String {
    match result {
        RetryResult::NoRetryNeeded => "no retry needed".to_string(),
        RetryResult::CorrectedOnRetry {
            attempt,
            corrected_fields,
        } => format!(
            "corrected on attempt {attempt}: {}",
            corrected_fields.join(", ")
        ),
        RetryResult::StillFailing { attempts: 0 } => "not retried".to_string(),
        RetryResult::StillFailing { attempts } => {
            format!("still failing after {attempts} retry attempt(s)")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
