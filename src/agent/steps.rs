// Step log - append-only audit trail of a run

use super::types::{ExecutionStep, StepKind};
use crate::brain::ToolCall;
use crate::executor::ToolResult;
use chrono::Utc;

/// `step-<unix millis>-<8 hex digits>`
pub fn step_id() -> String {
    format!(
        "step-{}-{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

#[derive(Debug, Default, Clone)]
pub struct StepLog {
    steps: Vec<ExecutionStep>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step and return a copy of it
    pub fn record(
        &mut self,
        kind: StepKind,
        content: impl Into<String>,
        tool_call: Option<ToolCall>,
        tool_result: Option<ToolResult>,
    ) -> ExecutionStep {
        let step = ExecutionStep {
            id: step_id(),
            kind,
            content: content.into(),
            tool_call,
            tool_result,
            timestamp: Utc::now(),
        };
        self.steps.push(step.clone());
        step
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_step_id_format() {
        let id = step_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "step");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut log = StepLog::new();
        log.record(StepKind::Message, "goal", None, None);
        log.record(StepKind::Think, "iteration 1", None, None);

        let kinds: Vec<StepKind> = log.steps().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepKind::Message, StepKind::Think]);
        assert!(log.steps()[0].timestamp <= log.steps()[1].timestamp);
    }

    #[test]
    fn test_ids_unique() {
        let mut log = StepLog::new();
        for _ in 0..200 {
            log.record(StepKind::Think, "x", None, None);
        }
        let ids: HashSet<&str> = log.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_step_serializes_kind_as_type() {
        let mut log = StepLog::new();
        let step = log.record(StepKind::ToolResult, "done", None, None);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert!(json.get("tool_call").is_none());
    }
}
