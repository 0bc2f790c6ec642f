use serde::{Deserialize, Serialize};

use super::audit::AuditReport;
use super::enums::{ConflictSeverity, DecisionOutcome, DocumentType};

/// Outcome of the self-correction loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryResult {
    NoRetryNeeded,
    CorrectedOnRetry {
        /// Extraction that passed audit, counting the initial one as 1.
        attempt: u32,
        corrected_fields: Vec<String>,
    },
    StillFailing {
        /// Retries made after the initial extraction.
        attempts: u32,
    },
}

impl RetryResult {
    /// Retries made after the initial extraction.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::NoRetryNeeded => 0,
            Self::CorrectedOnRetry { attempt, .. } => attempt.saturating_sub(1),
            Self::StillFailing { attempts } => *attempts,
        }
    }

    pub fn corrected_fields(&self) -> &[String] {
        match self {
            Self::CorrectedOnRetry {
                corrected_fields, ..
            } => corrected_fields,
            _ => &[],
        }
    }
}

/// A field on which two extraction models disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub field: String,
    pub fast_value: Option<String>,
    pub expert_value: Option<String>,
    pub severity: ConflictSeverity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub conflicts: Vec<Conflict>,
}

impl ConsensusReport {
    pub fn new(conflicts: Vec<Conflict>) -> Self {
        Self { conflicts }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn critical_conflicts(&self) -> Vec<&Conflict> {
        self.conflicts
            .iter()
            .filter(|c| c.severity == ConflictSeverity::Critical)
            .collect()
    }
}

/// Everything the judgment engine looks at for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentContext {
    pub has_essential_fields: bool,
    pub missing_essential_fields: Vec<String>,
    pub document_type: DocumentType,
    pub audit_report: AuditReport,
    pub retry_result: Option<RetryResult>,
    pub extraction_confidence: f32,
    pub consensus_report: Option<ConsensusReport>,
}

/// Terminal artifact of the pipeline. Persisted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentDecision {
    pub outcome: DecisionOutcome,
    pub confidence: f32,
    pub reasoning: String,
    pub issues: Vec<String>,
    pub retry_attempts: u32,
    pub corrected_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_attempts_by_variant() {
        assert_eq!(RetryResult::NoRetryNeeded.attempts(), 0);
        assert_eq!(
            RetryResult::CorrectedOnRetry {
                attempt: 2,
                corrected_fields: vec!["payment.iban".into()],
            }
            .attempts(),
            1
        );
        assert_eq!(RetryResult::StillFailing { attempts: 3 }.attempts(), 3);
    }

    #[test]
    fn corrected_fields_only_for_corrected_variant() {
        assert!(RetryResult::StillFailing { attempts: 1 }.corrected_fields().is_empty());
        let corrected = RetryResult::CorrectedOnRetry {
            attempt: 1,
            corrected_fields: vec!["totals".into()],
        };
        assert_eq!(corrected.corrected_fields(), ["totals".to_string()]);
    }

    #[test]
    fn retry_result_serializes_tagged() {
        let json = serde_json::to_string(&RetryResult::StillFailing { attempts: 3 }).unwrap();
        assert_eq!(json, r#"{"kind":"still_failing","attempts":3}"#);
    }

    #[test]
    fn consensus_partitions_critical_conflicts() {
        let report = ConsensusReport::new(vec![
            Conflict {
                field: "totals.total_amount".into(),
                fast_value: Some("100.00".into()),
                expert_value: Some("110.00".into()),
                severity: ConflictSeverity::Critical,
            },
            Conflict {
                field: "vendor.address".into(),
                fast_value: None,
                expert_value: Some("Rue 1".into()),
                severity: ConflictSeverity::Minor,
            },
        ]);
        assert!(report.has_conflicts());
        assert_eq!(report.critical_conflicts().len(), 1);
        assert!(!ConsensusReport::default().has_conflicts());
    }
}
