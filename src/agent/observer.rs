// Execution observer - progress callbacks for the host

use super::types::ExecutionStep;
use crate::brain::ToolCall;
use crate::executor::ToolResult;

/// Callbacks fired synchronously from the loop. Every method defaults to a no-op.
pub trait ExecutionObserver: Send + Sync {
    fn on_step(&self, _step: &ExecutionStep) {}

    fn on_tool_call(&self, _call: &ToolCall) {}

    fn on_tool_result(&self, _result: &ToolResult) {}

    /// Fired once when the run finishes with a summary
    fn on_complete(&self, _summary: &str) {}

    fn on_error(&self, _error: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}
