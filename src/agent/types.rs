// Agent types

use crate::brain::ToolCall;
use crate::executor::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt::DEFAULT_SYSTEM_PROMPT;

/// Engine configuration, fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on loop iterations per run
    pub max_iterations: u32,
    /// Deadline in seconds for each model call and each tool handler (0 = none)
    pub timeout_secs: u64,
    /// Treat every `ask` permission as confirmed
    pub auto_confirm_destructive: bool,
    /// After a batch with failed tools, ask the model to reflect before continuing
    pub enable_reflection: bool,
    /// Static instructions placed before the tool listing
    pub system_prompt: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            timeout_secs: 120,
            auto_confirm_destructive: false,
            enable_reflection: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Lifecycle of an engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Think,
    ToolCall,
    ToolResult,
    Message,
}

/// One entry of the run's audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// `step-<unix millis>-<random hex>`
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    pub timestamp: DateTime<Utc>,
}
