// Main Executor implementation - the tool registry

use crate::brain::{ToolCall, ToolSchema};
use crate::executor::config::ExecutorConfig;
use crate::executor::control::{AskUserTool, CompleteTool};
use crate::executor::error::{ExecutorError, Result};
use crate::executor::fs::{
    CreateDirectoryTool, DeleteFileTool, EditFileTool, ListFilesTool, ReadFileTool,
    SearchCodeTool, WriteFileTool,
};
use crate::executor::schema;
use crate::executor::shell::RunCommandTool;
use crate::executor::tool::{ToolContext, ToolImpl, load_tool_descriptions};
use crate::executor::types::{ToolDefinition, ToolOutput, ToolResult};
use crate::executor::web::{WebFetchTool, WebSearchTool};
use crate::permission::PermissionMode;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct Registered {
    definition: ToolDefinition,
    tool: Arc<dyn ToolImpl>,
}

/// Registry mapping tool names to handlers, in registration order
pub struct Executor {
    tools: Vec<Registered>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    descriptions: HashMap<String, String>,
}

impl Executor {
    /// Registry with no tools
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            aliases: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    /// Initialize with the built-in tool set
    pub fn init(config: ExecutorConfig) -> Self {
        debug!(
            timeout_secs = config.constraints.timeout_secs,
            max_output_bytes = config.constraints.max_output_bytes,
            shell = %config.shell,
            shell_enabled = config.shell_enabled,
            "initializing executor"
        );

        let mut executor = Self::empty();

        if let Some(path) = &config.tools_toml_path {
            executor.descriptions = load_tool_descriptions(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load tool descriptions");
                HashMap::new()
            });
        }

        executor.register(ReadFileTool);
        executor.register(WriteFileTool);
        executor.register(EditFileTool);
        executor.register(DeleteFileTool);
        executor.register(ListFilesTool);
        executor.register(SearchCodeTool);
        executor.register(CreateDirectoryTool);
        executor.register(RunCommandTool::new(
            config.shell.clone(),
            config.shell_enabled,
            config.constraints.clone(),
        ));
        executor.register(WebFetchTool::new(&config.web));
        executor.register(WebSearchTool::new(&config.web));
        executor.register(AskUserTool);
        executor.register(CompleteTool);
        executor.alias("list_directory", "list_files");

        info!(tool_count = executor.tools.len(), "executor initialized with tools");
        executor
    }

    /// Add a tool; a later registration under the same name replaces the earlier one
    pub fn register(&mut self, tool: impl ToolImpl + 'static) {
        let mut definition = tool.definition();
        if let Some(description) = self.descriptions.get(&definition.name) {
            definition.description = description.clone();
        }

        let entry = Registered {
            definition,
            tool: Arc::new(tool),
        };
        let name = entry.definition.name.clone();
        match self.index.get(&name) {
            Some(&idx) => self.tools[idx] = entry,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Accept `alias` as another name for `target`; aliases are not advertised
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    fn lookup(&self, name: &str) -> Option<&Registered> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    /// Get all tool definitions
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Definitions in the shape the model request expects
    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.definition.schema()).collect()
    }

    /// Built-in permission defaults for the gate
    pub fn default_permissions(&self) -> Vec<(String, PermissionMode)> {
        self.tools
            .iter()
            .map(|t| (t.definition.name.clone(), t.definition.default_permission))
            .collect()
    }

    /// Execute a tool by name with JSON input, validating it first
    pub async fn execute(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let registered = self
            .lookup(tool_name)
            .ok_or_else(|| ExecutorError::UnknownTool(tool_name.to_string()))?;

        schema::validate(&registered.definition, &input)
            .map_err(|e| ExecutorError::invalid(&registered.definition.name, e))?;

        info!(tool_name = %tool_name, "executing tool");
        registered.tool.run(input, ctx).await
    }

    /// Execute one model tool call; every failure becomes a failed result
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        deadline: Option<Duration>,
    ) -> ToolResult {
        let start = Instant::now();
        let (ctx, pending) = ctx.track_confirmations();
        let run = self.execute(&call.name, call.arguments.clone(), &ctx);

        let outcome = match deadline {
            Some(limit) => match run_with_deadline(run, limit, pending).await {
                Some(outcome) => outcome,
                None => Err(ExecutorError::Timeout(call.name.clone(), limit.as_secs())),
            },
            None => run.await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) if output.is_error => ToolResult::err(call, output.content),
            Ok(output) => {
                let mut result = ToolResult::ok(call, output.content);
                result.changed_paths = output.changed_paths;
                result
            }
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "tool execution failed");
                ToolResult::err(call, e.to_string())
            }
        };
        result.with_duration(duration_ms)
    }
}

/// Drive `run` under `limit`. The clock stops while a confirmation is
/// outstanding; `None` means the limit ran out.
async fn run_with_deadline<F: Future>(
    run: F,
    limit: Duration,
    mut pending: watch::Receiver<bool>,
) -> Option<F::Output> {
    tokio::pin!(run);
    let mut remaining = limit;
    loop {
        let started = Instant::now();
        tokio::select! {
            output = &mut run => return Some(output),
            _ = tokio::time::sleep(remaining) => return None,
            true = async { pending.wait_for(|waiting| *waiting).await.is_ok() } => {
                remaining = remaining.saturating_sub(started.elapsed());
                debug!(remaining_ms = remaining.as_millis() as u64, "deadline paused for confirmation");
                tokio::select! {
                    output = &mut run => return Some(output),
                    _ = async { pending.wait_for(|waiting| !*waiting).await.is_ok() } => {}
                }
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::init(ExecutorConfig::default())
    }
}
