// Shell command tool

use crate::executor::schema::parse;
use crate::executor::tool::{ToolContext, ToolImpl};
use crate::executor::types::{ExecutionConstraints, Parameter, ToolDefinition};
use crate::executor::{ExecutorError, Result, ToolOutput};
use crate::permission::PermissionMode;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CommandInput {
    command: String,
}

/// Runs a command through the configured shell in the workspace root.
///
/// Only available for workspaces backed by a directory and when shell
/// execution is enabled; otherwise every call fails with an explanation.
pub struct RunCommandTool {
    shell: String,
    enabled: bool,
    constraints: ExecutionConstraints,
}

impl RunCommandTool {
    pub fn new(shell: impl Into<String>, enabled: bool, constraints: ExecutionConstraints) -> Self {
        Self {
            shell: shell.into(),
            enabled,
            constraints,
        }
    }

    fn unavailable(reason: &str) -> ExecutorError {
        ExecutorError::Unavailable {
            tool: "run_command".to_string(),
            reason: reason.to_string(),
        }
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[async_trait]
impl ToolImpl for RunCommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "run_command",
            "Run a shell command in the workspace root. Stdout, stderr and the exit code are returned.",
            PermissionMode::Ask,
        )
        .param(Parameter::string("command", "The command line to execute"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let CommandInput { command } =
            parse(input).map_err(|e| ExecutorError::invalid("run_command", e))?;
        ctx.ensure_allowed("run_command")?;

        if !self.enabled {
            return Err(Self::unavailable("shell execution is disabled for this session"));
        }
        let Some(root) = ctx.workspace.root().map(|p| p.to_path_buf()) else {
            return Err(Self::unavailable("the workspace is not backed by a directory"));
        };

        ctx.authorize("run_command", format!("Run command: {}", command), root.display().to_string())
            .await?;

        debug!(command = %command, cwd = %root.display(), "executing command");
        let start = Instant::now();

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(&command)
            .current_dir(&root)
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.constraints.timeout_secs), child)
            .await
            .map_err(|_| ExecutorError::Timeout("run_command".to_string(), self.constraints.timeout_secs))?
            .map_err(|e| ExecutorError::SpawnFailed("run_command".to_string(), e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let max = self.constraints.max_output_bytes;

        let mut content = String::new();
        if !stdout.is_empty() {
            content.push_str("[stdout]\n");
            content.push_str(truncate_bytes(&stdout, max));
        }
        if !stderr.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str("[stderr]\n");
            content.push_str(truncate_bytes(&stderr, max));
        }
        if stdout.len() > max || stderr.len() > max {
            content.push_str(&format!("\n[output truncated to {} bytes per stream]", max));
        }

        let exit_code = output.status.code().unwrap_or(-1);
        content.push_str(&format!("\n[exit_code]\n{}", exit_code));

        info!(
            command = %command.chars().take(100).collect::<String>(),
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = exit_code,
            output_bytes = content.len(),
            "command executed"
        );

        if output.status.success() {
            Ok(ToolOutput::success(content))
        } else {
            Ok(ToolOutput::error(content))
        }
    }
}
