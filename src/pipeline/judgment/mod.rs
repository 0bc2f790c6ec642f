//! Final decision for one document: auto-approve, needs review or reject.
//!
//! Rules are evaluated top to bottom and the first match wins:
//! 1. essential fields missing → Reject
//! 2. unknown document type → Reject
//! 3. critical failures that survived the retry loop → Reject
//! 4. extraction confidence under the review floor → Reject
//! 5. soft issues → NeedsReview
//! 6. otherwise → AutoApprove

pub mod confidence;

pub use confidence::*;

use serde::{Deserialize, Serialize};

use crate::models::{
    DecisionOutcome, DocumentType, JudgmentContext, JudgmentDecision, RetryResult,
};

/// Thresholds of the decision tree. Immutable once handed to an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    /// Below this, the extraction is too unreliable even for review.
    pub needs_review_min_confidence: f32,
    pub auto_approve_min_confidence: f32,
    pub max_warnings_for_auto_approve: usize,
    pub auto_approve_with_warnings: bool,
    /// Treat critical model disagreements as blocking.
    pub require_consensus_for_auto_approve: bool,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            needs_review_min_confidence: 0.5,
            auto_approve_min_confidence: 0.85,
            max_warnings_for_auto_approve: 2,
            auto_approve_with_warnings: false,
            require_consensus_for_auto_approve: false,
        }
    }
}

pub struct JudgmentEngine {
    config: JudgmentConfig,
}

impl JudgmentEngine {
    pub fn new(config: JudgmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JudgmentConfig {
        &self.config
    }

    pub fn evaluate(&self, context: &JudgmentContext) -> JudgmentDecision {
        let decision = self.decide(context);
        tracing::info!(
            document_type = %context.document_type,
            outcome = %decision.outcome,
            confidence = decision.confidence,
            issues = decision.issues.len(),
            "Judgment rendered"
        );
        decision
    }

    /// Cheap pre-filter: false when any hard reject rule would fire.
    pub fn can_potentially_auto_approve(&self, context: &JudgmentContext) -> bool {
        context.has_essential_fields
            && context.document_type != DocumentType::Unknown
            && !(has_critical_failures(context) && retry_exhausted(context))
            && context.extraction_confidence >= self.config.needs_review_min_confidence
    }

    fn decide(&self, context: &JudgmentContext) -> JudgmentDecision {
        if !context.has_essential_fields {
            let issues = context
                .missing_essential_fields
                .iter()
                .map(|f| format!("Missing {f}"))
                .collect();
            return reject(
                context,
                reject_confidence::MISSING_FIELDS,
                "Essential fields are missing from the extraction",
                issues,
            );
        }

        if context.document_type == DocumentType::Unknown {
            return reject(
                context,
                reject_confidence::UNKNOWN_TYPE,
                "Document type could not be determined",
                vec!["Unknown document type".to_string()],
            );
        }

        if has_critical_failures(context) && retry_exhausted(context) {
            let issues = context
                .audit_report
                .critical_failures()
                .iter()
                .map(|c| c.message.clone())
                .collect();
            return reject(
                context,
                reject_confidence::PERSISTENT_FAILURES,
                "Critical validation failures persisted after self-correction",
                issues,
            );
        }

        if context.extraction_confidence < self.config.needs_review_min_confidence {
            return reject(
                context,
                reject_confidence::LOW_EXTRACTION_CONFIDENCE,
                &format!(
                    "Extraction confidence {:.2} is below the review floor {:.2}",
                    context.extraction_confidence, self.config.needs_review_min_confidence
                ),
                vec!["Extraction confidence too low".to_string()],
            );
        }

        let issues = self.soft_issues(context);
        let confidence = derived_confidence(context);

        if !issues.is_empty() {
            let reasoning = format!(
                "{} issue(s) require human review",
                issues.len()
            );
            return build(context, DecisionOutcome::NeedsReview, confidence, reasoning, issues);
        }

        build(
            context,
            DecisionOutcome::AutoApprove,
            confidence,
            approval_reasoning(context),
            Vec::new(),
        )
    }

    fn soft_issues(&self, context: &JudgmentContext) -> Vec<String> {
        let mut issues: Vec<String> = context
            .audit_report
            .critical_failures()
            .iter()
            .map(|c| c.message.clone())
            .collect();

        if self.config.require_consensus_for_auto_approve {
            if let Some(consensus) = &context.consensus_report {
                issues.extend(
                    consensus
                        .critical_conflicts()
                        .iter()
                        .map(|c| format!("Models disagree on {}", c.field)),
                );
            }
        }

        let warnings = context.audit_report.warnings().len();
        if warnings > self.config.max_warnings_for_auto_approve
            && !self.config.auto_approve_with_warnings
        {
            issues.push(format!(
                "{warnings} validation warnings (max {})",
                self.config.max_warnings_for_auto_approve
            ));
        }

        if context.extraction_confidence < self.config.auto_approve_min_confidence {
            issues.push(format!(
                "Confidence {:.2} below auto-approve threshold {:.2}",
                context.extraction_confidence, self.config.auto_approve_min_confidence
            ));
        }

        issues
    }
}

impl Default for JudgmentEngine {
    fn default() -> Self {
        Self::new(JudgmentConfig::default())
    }
}

fn has_critical_failures(context: &JudgmentContext) -> bool {
    !context.audit_report.is_valid()
}

/// At least one retry ran and none cleared the critical checks. Zero
/// attempts means the audit was never retried.
fn retry_exhausted(context: &JudgmentContext) -> bool {
    matches!(
        context.retry_result,
        Some(RetryResult::StillFailing { attempts }) if attempts > 0
    )
}

fn approval_reasoning(context: &JudgmentContext) -> String {
    let passed = context.audit_report.passed_count();
    let mut parts = vec![format!("All {passed} validation check(s) passed")];
    if context
        .consensus_report
        .as_ref()
        .is_some_and(|r| !r.has_conflicts())
    {
        parts.push("models agree".to_string());
    }
    if let Some(RetryResult::CorrectedOnRetry {
        attempt,
        corrected_fields,
    }) = &context.retry_result
    {
        parts.push(format!(
            "corrected {} on attempt {attempt}",
            corrected_fields.join(", ")
        ));
    }
    parts.join("; ")
}

fn reject(
    context: &JudgmentContext,
    confidence: f32,
    reasoning: &str,
    issues: Vec<String>,
) -> JudgmentDecision {
    build(
        context,
        DecisionOutcome::Reject,
        confidence,
        reasoning.to_string(),
        issues,
    )
}

fn build(
    context: &JudgmentContext,
    outcome: DecisionOutcome,
    confidence: f32,
    reasoning: String,
    issues: Vec<String>,
) -> JudgmentDecision {
    let (retry_attempts, corrected_fields) = match &context.retry_result {
        Some(r) => (r.attempts(), r.corrected_fields().to_vec()),
        None => (0, Vec::new()),
    };
    JudgmentDecision {
        outcome,
        confidence,
        reasoning,
        issues,
        retry_attempts,
        corrected_fields,
    }
}
