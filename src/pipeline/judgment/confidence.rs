use crate::models::{AuditStatus, JudgmentContext};

/// Fixed confidence of each rejection rule.
pub mod reject_confidence {
    pub const MISSING_FIELDS: f32 = 0.90;
    pub const UNKNOWN_TYPE: f32 = 0.95;
    pub const PERSISTENT_FAILURES: f32 = 0.85;
    pub const LOW_EXTRACTION_CONFIDENCE: f32 = 0.80;
}

const CLEAN_AUDIT_BONUS: f32 = 0.05;
const CONSENSUS_BONUS: f32 = 0.05;
const WARNING_PENALTY: f32 = 0.02;

/// Re-estimate confidence for review/approval outcomes.
///
/// A heuristic, not a calibrated probability: extraction confidence,
/// +0.05 for a fully passed audit, +0.05 when no model conflicts were seen
/// (each capped at 1.0), then −0.02 per warning (floored at 0.0).
pub fn derived_confidence(context: &JudgmentContext) -> f32 {
    let mut confidence = context.extraction_confidence;

    if context.audit_report.overall_status() == AuditStatus::Passed {
        confidence = (confidence + CLEAN_AUDIT_BONUS).min(1.0);
    }

    let conflicts = context
        .consensus_report
        .as_ref()
        .is_some_and(|r| r.has_conflicts());
    if !conflicts {
        confidence = (confidence + CONSENSUS_BONUS).min(1.0);
    }

    let warnings = context.audit_report.warnings().len() as f32;
    (confidence - WARNING_PENALTY * warnings).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuditCheck, AuditReport, CheckType, Conflict, ConflictSeverity, ConsensusReport,
        DocumentType, Severity,
    };

    fn context(confidence: f32, report: AuditReport) -> JudgmentContext {
        JudgmentContext {
            has_essential_fields: true,
            missing_essential_fields: vec![],
            document_type: DocumentType::Invoice,
            audit_report: report,
            retry_result: None,
            extraction_confidence: confidence,
            consensus_report: None,
        }
    }

    fn warning() -> AuditCheck {
        AuditCheck::failed(CheckType::VatRate, "line_items.0.vat_rate", Severity::Warning, "odd")
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn clean_audit_and_no_conflicts_add_both_bonuses() {
        let ctx = context(0.80, AuditReport::default());
        assert!(approx(derived_confidence(&ctx), 0.90));
    }

    #[test]
    fn bonuses_are_capped_at_one() {
        let ctx = context(0.97, AuditReport::default());
        assert!(approx(derived_confidence(&ctx), 1.0));
    }

    #[test]
    fn warnings_cost_two_points_each() {
        let ctx = context(0.80, AuditReport::new(vec![warning(), warning()]));
        // No clean-audit bonus, consensus bonus only, minus two warnings.
        assert!(approx(derived_confidence(&ctx), 0.81));
    }

    #[test]
    fn conflicts_withhold_consensus_bonus() {
        let mut ctx = context(0.80, AuditReport::default());
        ctx.consensus_report = Some(ConsensusReport::new(vec![Conflict {
            field: "vendor.name".into(),
            fast_value: Some("Acme".into()),
            expert_value: Some("Acme BV".into()),
            severity: ConflictSeverity::Minor,
        }]));
        assert!(approx(derived_confidence(&ctx), 0.85));
    }

    #[test]
    fn floored_at_zero() {
        let ctx = context(0.0, AuditReport::new(vec![warning(); 10]));
        assert_eq!(derived_confidence(&ctx), 0.0);
    }
}
