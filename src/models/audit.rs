use serde::{Deserialize, Serialize};

use super::enums::{AuditStatus, CheckType, Severity};

/// Outcome of a single deterministic audit check.
///
/// `hint` is worded as an instruction to the extraction model, so failing
/// checks can be folded straight into a retry prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCheck {
    pub check_type: CheckType,
    pub field: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    pub hint: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl AuditCheck {
    pub fn passed(check_type: CheckType, field: &str, message: impl Into<String>) -> Self {
        Self {
            check_type,
            field: field.to_string(),
            passed: true,
            severity: Severity::Info,
            message: message.into(),
            hint: None,
            expected: None,
            actual: None,
        }
    }

    /// A check that could not run because its inputs are missing.
    pub fn skipped(check_type: CheckType, field: &str, message: impl Into<String>) -> Self {
        Self::passed(check_type, field, message)
    }

    pub fn failed(
        check_type: CheckType,
        field: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_type,
            field: field.to_string(),
            passed: false,
            severity,
            message: message.into(),
            hint: None,
            expected: None,
            actual: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn is_critical_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Critical
    }

    pub fn is_warning_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

/// All checks from one audit pass. Never merged across retries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub checks: Vec<AuditCheck>,
}

impl AuditReport {
    pub fn new(checks: Vec<AuditCheck>) -> Self {
        Self { checks }
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn critical_failures(&self) -> Vec<&AuditCheck> {
        self.checks.iter().filter(|c| c.is_critical_failure()).collect()
    }

    pub fn warnings(&self) -> Vec<&AuditCheck> {
        self.checks.iter().filter(|c| c.is_warning_failure()).collect()
    }

    pub fn is_valid(&self) -> bool {
        !self.checks.iter().any(AuditCheck::is_critical_failure)
    }

    /// Failed if any critical failure, else WarningsOnly if any warning
    /// failure, else Passed.
    pub fn overall_status(&self) -> AuditStatus {
        if self.checks.iter().any(AuditCheck::is_critical_failure) {
            AuditStatus::Failed
        } else if self.checks.iter().any(AuditCheck::is_warning_failure) {
            AuditStatus::WarningsOnly
        } else {
            AuditStatus::Passed
        }
    }

    /// Retry hints of every failed check, in check order, deduplicated.
    pub fn failure_hints(&self) -> Vec<String> {
        let mut hints: Vec<String> = Vec::new();
        for hint in self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .filter_map(|c| c.hint.as_ref())
        {
            if !hints.contains(hint) {
                hints.push(hint.clone());
            }
        }
        hints
    }

    /// Fields that have at least one failed check.
    pub fn failed_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for check in self.checks.iter().filter(|c| !c.passed) {
            if !fields.contains(&check.field.as_str()) {
                fields.push(check.field.as_str());
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(passed: bool, severity: Severity) -> AuditCheck {
        AuditCheck {
            check_type: CheckType::Math,
            field: "totals".into(),
            passed,
            severity,
            message: String::new(),
            hint: None,
            expected: None,
            actual: None,
        }
    }

    #[test]
    fn empty_report_passes() {
        let report = AuditReport::default();
        assert_eq!(report.overall_status(), AuditStatus::Passed);
        assert!(report.is_valid());
    }

    #[test]
    fn aggregation_matches_definition_for_every_combination() {
        let severities = [Severity::Critical, Severity::Warning, Severity::Info];
        let mut pool = Vec::new();
        for s in severities {
            pool.push(check(true, s));
            pool.push(check(false, s));
        }

        // Every subset of the six check shapes.
        for mask in 0u32..(1 << pool.len()) {
            let checks: Vec<AuditCheck> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| c.clone())
                .collect();
            let has_critical = checks.iter().any(|c| !c.passed && c.severity == Severity::Critical);
            let has_warning = checks.iter().any(|c| !c.passed && c.severity == Severity::Warning);
            let report = AuditReport::new(checks);

            let expected = if has_critical {
                AuditStatus::Failed
            } else if has_warning {
                AuditStatus::WarningsOnly
            } else {
                AuditStatus::Passed
            };
            assert_eq!(report.overall_status(), expected, "mask {mask:06b}");
            assert_eq!(report.is_valid(), !has_critical);
        }
    }

    #[test]
    fn failed_info_check_does_not_degrade_status() {
        let report = AuditReport::new(vec![check(false, Severity::Info)]);
        assert_eq!(report.overall_status(), AuditStatus::Passed);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn counts_and_partitions() {
        let report = AuditReport::new(vec![
            check(true, Severity::Info),
            check(false, Severity::Critical),
            check(false, Severity::Warning),
            check(false, Severity::Warning),
        ]);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 3);
        assert_eq!(report.critical_failures().len(), 1);
        assert_eq!(report.warnings().len(), 2);
    }

    #[test]
    fn failure_hints_are_deduplicated() {
        let report = AuditReport::new(vec![
            check(false, Severity::Critical).with_hint("Re-read the totals"),
            check(false, Severity::Warning).with_hint("Re-read the totals"),
            check(true, Severity::Info).with_hint("ignored"),
        ]);
        assert_eq!(report.failure_hints(), vec!["Re-read the totals".to_string()]);
    }
}
