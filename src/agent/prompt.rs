// Prompt construction

use crate::executor::ToolDefinition;
use crate::workflow::WorkflowTemplate;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous coding assistant working inside \
the user's project workspace. Accomplish the task by calling the available tools.

Guidelines:
- Inspect files before changing them and keep edits minimal and precise.
- Tool calls in one response run in order; later calls see the effects of earlier ones.
- If a tool fails, read the error and adjust instead of repeating the same call.
- If you need information only the user has, call ask_user.
- When the task is finished, call complete with a short summary of what you did.";

/// Appended after a batch where at least one tool failed
pub const REFLECTION_PROMPT: &str = "Some tool calls in the last step failed. Before continuing, \
reflect on what went wrong and adjust your approach.";

/// Static instructions followed by a listing of every tool and its parameters
pub fn system_prompt(base: &str, tools: &[ToolDefinition]) -> String {
    let mut out = String::from(base.trim_end());
    out.push_str("\n\n# Available tools\n");

    for tool in tools {
        out.push_str(&format!("\n## {}\n{}\n", tool.name, tool.description));
        if tool.parameters.is_empty() {
            out.push_str("Parameters: none\n");
            continue;
        }
        out.push_str("Parameters:\n");
        for param in &tool.parameters {
            let mut line = format!(
                "- {} ({}, {})",
                param.name,
                param.kind.as_str(),
                if param.required { "required" } else { "optional" }
            );
            if !param.enum_values.is_empty() {
                line.push_str(&format!(", one of: {}", param.enum_values.join(", ")));
            }
            line.push_str(&format!(": {}\n", param.description));
            out.push_str(&line);
        }
    }
    out
}

/// First user message: the instruction plus optional workflow guidance and workspace summary
pub fn user_message(
    instruction: &str,
    workflow: Option<&WorkflowTemplate>,
    workspace_summary: Option<&str>,
) -> String {
    let mut out = instruction.to_string();
    if let Some(template) = workflow {
        out.push_str("\n\n");
        out.push_str(&template.guidance());
    }
    if let Some(summary) = workspace_summary {
        out.push_str("\n\n# Workspace\n");
        out.push_str(summary);
    }
    out
}
