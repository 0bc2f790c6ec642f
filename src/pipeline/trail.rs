//! Step-by-step record of one document run, handed to persistence with the
//! decision.

use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// 1-based position in the run.
    pub step: u32,
    pub action: String,
    /// Model name or component that performed the action.
    pub tool: String,
    pub duration_ms: u64,
    pub notes: Option<String>,
}

/// Append-only. Steps are numbered in the order they are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTrail {
    steps: Vec<ProcessingStep>,
}

impl ProcessingTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step that began at `started`.
    pub fn record(
        &mut self,
        action: &str,
        tool: &str,
        started: Instant,
        notes: Option<String>,
    ) -> &ProcessingStep {
        let duration_ms = started.elapsed().as_millis() as u64;
        self.push(action, tool, duration_ms, notes)
    }

    pub fn push(
        &mut self,
        action: &str,
        tool: &str,
        duration_ms: u64,
        notes: Option<String>,
    ) -> &ProcessingStep {
        let step = ProcessingStep {
            step: self.steps.len() as u32 + 1,
            action: action.to_string(),
            tool: tool.to_string(),
            duration_ms,
            notes,
        };
        tracing::debug!(
            step = step.step,
            action = %step.action,
            tool = %step.tool,
            elapsed_ms = duration_ms,
            "Pipeline step"
        );
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }

    pub fn into_steps(self) -> Vec<ProcessingStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_in_order() {
        let mut trail = ProcessingTrail::new();
        trail.push("classify", "qwen2.5vl", 120, None);
        trail.push("extract", "qwen2.5vl", 800, Some("invoice".into()));
        trail.push("audit", "audit_engine", 1, None);

        let numbers: Vec<u32> = trail.steps().iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(trail.steps()[1].notes.as_deref(), Some("invoice"));
        assert_eq!(trail.total_duration_ms(), 921);
    }

    #[test]
    fn record_measures_elapsed_time() {
        let mut trail = ProcessingTrail::new();
        let started = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let step = trail.record("judge", "judgment_engine", started, None);
        assert!(step.duration_ms >= 5);
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn trail_serializes_as_step_list() {
        let mut trail = ProcessingTrail::new();
        trail.push("classify", "m", 3, None);
        let json = serde_json::to_value(&trail).unwrap();
        assert_eq!(json["steps"][0]["action"], "classify");
        assert_eq!(json["steps"][0]["duration_ms"], 3);
    }
}
