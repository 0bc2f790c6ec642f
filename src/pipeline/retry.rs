//! Bounded self-correction loop.
//!
//! Each attempt re-runs extraction with the failing checks' hints folded
//! into the prompt. A retry is adopted only if its confidence is strictly
//! greater than the current best; otherwise the loop stops at once. An
//! adopted retry that clears every critical check ends the loop as
//! `CorrectedOnRetry`, numbered by extraction: the initial extraction is
//! attempt 1, so retry k reports attempt k + 1.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::audit::AuditEngine;
use super::extraction::Extractor;
use super::ports::DocumentImage;
use crate::models::{AuditReport, DocumentType, ExtractedPayload, RetryResult};

/// Hard ceiling on correction attempts, whatever the configuration says.
pub const MAX_CORRECTIONS: u32 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("Correction cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

/// Best payload and its audit after the loop, with the loop's verdict.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: RetryResult,
    pub payload: ExtractedPayload,
    pub report: AuditReport,
}

pub struct RetryController {
    extractor: Arc<Extractor>,
    audit: Arc<AuditEngine>,
    max_attempts: u32,
    inject_hints: bool,
}

impl RetryController {
    /// `max_retries` is clamped to `MAX_CORRECTIONS`.
    pub fn new(extractor: Arc<Extractor>, audit: Arc<AuditEngine>, max_retries: u32) -> Self {
        Self {
            extractor,
            audit,
            max_attempts: max_retries.min(MAX_CORRECTIONS),
            inject_hints: true,
        }
    }

    /// Re-run extraction blind, without audit hints in the prompt.
    pub fn without_hints(mut self) -> Self {
        self.inject_hints = false;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[tracing::instrument(name = "retry", skip_all, fields(document_type = %document_type))]
    pub async fn attempt_correction(
        &self,
        images: &[DocumentImage],
        document_type: DocumentType,
        reference: Option<&ExtractedPayload>,
        payload: ExtractedPayload,
        report: AuditReport,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, RetryError> {
        if report.is_valid() {
            return Ok(RetryOutcome {
                result: RetryResult::NoRetryNeeded,
                payload,
                report,
            });
        }

        let initially_failed: Vec<String> = report
            .critical_failures()
            .iter()
            .map(|c| c.field.clone())
            .collect();
        let mut best_payload = payload;
        let mut best_report = report;
        let mut attempts = 0;

        for attempt in 1..=self.max_attempts {
            let hints = if self.inject_hints {
                best_report.failure_hints()
            } else {
                Vec::new()
            };

            let candidate = tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
                p = self.extractor.extract(images, document_type, reference, &hints) => p,
            };
            attempts = attempt;

            if candidate.confidence <= best_payload.confidence {
                tracing::info!(
                    attempt,
                    confidence = candidate.confidence,
                    best = best_payload.confidence,
                    "No confidence improvement, stopping correction"
                );
                break;
            }

            let candidate_report = tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
                r = self.audit.audit(&candidate) => r,
            };
            tracing::info!(
                attempt,
                confidence = candidate.confidence,
                status = %candidate_report.overall_status(),
                "Adopted improved extraction"
            );
            best_payload = candidate;
            best_report = candidate_report;

            if best_report.is_valid() {
                let still_failing = best_report.failed_fields();
                let corrected_fields = initially_failed
                    .iter()
                    .filter(|f| !still_failing.contains(&f.as_str()))
                    .cloned()
                    .collect();
                return Ok(RetryOutcome {
                    result: RetryResult::CorrectedOnRetry {
                        attempt: attempt + 1,
                        corrected_fields,
                    },
                    payload: best_payload,
                    report: best_report,
                });
            }
        }

        Ok(RetryOutcome {
            result: RetryResult::StillFailing { attempts },
            payload: best_payload,
            report: best_report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditStatus, DocumentFields, InvoiceFields, PaymentDetails};
    use crate::pipeline::audit::audit_payload;
    use crate::pipeline::ollama::ScriptedInferenceClient;
    use std::time::Duration;

    const GOOD_IBAN: &str = "BE68539007547034";
    const BAD_IBAN: &str = "BE68539007547035";

    fn payload_with(iban: &str, confidence: f32) -> ExtractedPayload {
        let mut p = ExtractedPayload::empty(DocumentType::Invoice);
        p.fields = DocumentFields::Invoice(InvoiceFields {
            payment: PaymentDetails {
                iban: Some(iban.into()),
                ..Default::default()
            },
            ..Default::default()
        });
        p.confidence = confidence;
        p.extracted_text = "FACTURE".into();
        p
    }

    fn response(iban: &str, confidence: f32) -> String {
        format!(
            r#"{{"fields": {{"payment": {{"iban": "{iban}"}}}}, "confidence": {confidence}, "extracted_text": "FACTURE"}}"#
        )
    }

    fn controller(client: Arc<ScriptedInferenceClient>, max_retries: u32) -> RetryController {
        RetryController::new(
            Arc::new(Extractor::new(client)),
            Arc::new(AuditEngine::new()),
            max_retries,
        )
    }

    fn images() -> Vec<DocumentImage> {
        vec![DocumentImage::new(1, vec![1])]
    }

    async fn run(
        controller: &RetryController,
        initial: ExtractedPayload,
    ) -> Result<RetryOutcome, RetryError> {
        let report = audit_payload(&initial);
        controller
            .attempt_correction(
                &images(),
                DocumentType::Invoice,
                None,
                initial,
                report,
                &CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn passing_audit_needs_no_retry() {
        let client = Arc::new(ScriptedInferenceClient::new("x"));
        let outcome = run(&controller(client.clone(), 3), payload_with(GOOD_IBAN, 0.9))
            .await
            .unwrap();
        assert_eq!(outcome.result, RetryResult::NoRetryNeeded);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn no_improvement_stops_after_one_attempt() {
        let client = Arc::new(
            ScriptedInferenceClient::new("x")
                .respond(response(BAD_IBAN, 0.5))
                .respond(response(GOOD_IBAN, 0.9)),
        );
        let outcome = run(&controller(client.clone(), 3), payload_with(BAD_IBAN, 0.5))
            .await
            .unwrap();
        assert_eq!(outcome.result, RetryResult::StillFailing { attempts: 1 });
        assert_eq!(client.call_count(), 1);
        assert_eq!(outcome.payload.confidence, 0.5);
    }

    #[tokio::test]
    async fn improving_attempts_are_adopted_until_audit_passes() {
        let client = Arc::new(
            ScriptedInferenceClient::new("x")
                .respond(response(BAD_IBAN, 0.7))
                .respond(response(GOOD_IBAN, 0.9)),
        );
        // Extractions at 0.5 (initial), 0.7 and 0.9.
        let outcome = run(&controller(client.clone(), 3), payload_with(BAD_IBAN, 0.5))
            .await
            .unwrap();
        assert_eq!(
            outcome.result,
            RetryResult::CorrectedOnRetry {
                attempt: 3,
                corrected_fields: vec!["payment.iban".into()],
            }
        );
        assert_eq!(outcome.result.attempts(), 2);
        assert_eq!(client.call_count(), 2);
        assert_eq!(outcome.payload.confidence, 0.9);
        assert_eq!(outcome.report.overall_status(), AuditStatus::Passed);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_still_failing() {
        let client = Arc::new(
            ScriptedInferenceClient::new("x")
                .respond(response(BAD_IBAN, 0.5))
                .respond(response(BAD_IBAN, 0.7))
                .respond(response(BAD_IBAN, 0.9))
                .respond(response(GOOD_IBAN, 0.95)),
        );
        let outcome = run(&controller(client.clone(), 3), payload_with(BAD_IBAN, 0.4))
            .await
            .unwrap();
        assert_eq!(outcome.result, RetryResult::StillFailing { attempts: 3 });
        assert_eq!(client.call_count(), 3);
        // Best attempt kept even though it still fails.
        assert_eq!(outcome.payload.confidence, 0.9);
    }

    #[tokio::test]
    async fn configured_retries_are_clamped() {
        let client = Arc::new(ScriptedInferenceClient::new("x"));
        assert_eq!(controller(client.clone(), 10).max_attempts(), MAX_CORRECTIONS);
        assert_eq!(controller(client, 1).max_attempts(), 1);
    }

    #[tokio::test]
    async fn zero_retries_reports_never_retried_without_calls() {
        let client = Arc::new(ScriptedInferenceClient::new("x"));
        let initial = payload_with(BAD_IBAN, 0.4);
        let outcome = run(&controller(client.clone(), 0), initial.clone())
            .await
            .unwrap();
        // Zero attempts: judgment treats this as never retried, not exhausted.
        assert_eq!(outcome.result, RetryResult::StillFailing { attempts: 0 });
        assert_eq!(outcome.result.attempts(), 0);
        assert_eq!(outcome.payload, initial);
        assert!(!outcome.report.is_valid());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn hints_are_injected_into_retry_prompt() {
        let client = Arc::new(ScriptedInferenceClient::new("x").respond(response(BAD_IBAN, 0.1)));
        run(&controller(client.clone(), 3), payload_with(BAD_IBAN, 0.4))
            .await
            .unwrap();
        assert!(client.requests()[0].user_content.contains("Re-read the IBAN"));
    }

    #[tokio::test]
    async fn blind_retry_sends_no_hints() {
        let client = Arc::new(ScriptedInferenceClient::new("x").respond(response(BAD_IBAN, 0.1)));
        let controller = controller(client.clone(), 3).without_hints();
        run(&controller, payload_with(BAD_IBAN, 0.4)).await.unwrap();
        assert!(!client.requests()[0].user_content.contains("failed these checks"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_attempt() {
        let client = Arc::new(
            ScriptedInferenceClient::new("x")
                .respond(response(GOOD_IBAN, 0.9))
                .with_delay(Duration::from_secs(30)),
        );
        let controller = controller(client, 3);
        let initial = payload_with(BAD_IBAN, 0.4);
        let report = audit_payload(&initial);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = controller
            .attempt_correction(&images(), DocumentType::Invoice, None, initial, report, &token)
            .await;
        assert_eq!(result.unwrap_err(), RetryError::Cancelled { attempts: 0 });
    }
}
