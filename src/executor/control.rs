// Control tools. The engine intercepts both before generic dispatch; the
// handlers here cover hosts that drive the registry directly.

use crate::executor::schema::parse;
use crate::executor::tool::{ToolContext, ToolImpl};
use crate::executor::types::{Parameter, ToolDefinition};
use crate::executor::{ExecutorError, Result, ToolOutput};
use crate::permission::PermissionMode;
use async_trait::async_trait;
use serde::Deserialize;

pub const ASK_USER: &str = "ask_user";
pub const COMPLETE: &str = "complete";

/// Summary used when `complete` arrives without one
pub const DEFAULT_SUMMARY: &str = "Task completed.";

#[derive(Debug, Deserialize)]
struct AskInput {
    question: String,
}

pub struct AskUserTool;

#[async_trait]
impl ToolImpl for AskUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            ASK_USER,
            "Ask the user a question when a decision or missing information blocks progress.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("question", "The question to ask"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let AskInput { question } =
            parse(input).map_err(|e| ExecutorError::invalid(ASK_USER, e))?;
        Ok(ToolOutput::success(ctx.bridge.ask(question).await))
    }
}

#[derive(Debug, Deserialize)]
struct CompleteInput {
    #[serde(default)]
    summary: Option<String>,
}

/// Extract the summary from `complete` arguments; never fails
pub fn completion_summary(arguments: &serde_json::Value) -> String {
    parse::<CompleteInput>(arguments.clone())
        .ok()
        .and_then(|c| c.summary)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string())
}

pub struct CompleteTool;

#[async_trait]
impl ToolImpl for CompleteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            COMPLETE,
            "Finish the task. Call this once everything is done, with a summary of what changed.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("summary", "What was accomplished"))
    }

    async fn run(&self, input: serde_json::Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        Ok(ToolOutput::success(completion_summary(&input)))
    }
}
