// Execution engine - the autonomous tool loop
#![allow(dead_code)]

use crate::brain::{ChatModel, ChatResponse, Message, ToolCall, ToolSchema};
use crate::bridge::Bridge;
use crate::executor::control::{completion_summary, ASK_USER, COMPLETE};
use crate::executor::{Executor, ToolContext, ToolResult};
use crate::permission::PermissionGate;
use crate::workflow::WorkflowMatcher;
use crate::workspace::Workspace;

use super::error::EngineError;
use super::observer::{ExecutionObserver, NoopObserver};
use super::prompt::{self, REFLECTION_PROMPT};
use super::steps::StepLog;
use super::types::{EngineConfig, EngineState, ExecutionStep, StepKind};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Returned when `execute` is called while a run is in progress
pub const ALREADY_RUNNING: &str = "Execution already in progress";

/// Returned when a run ends because `stop` was called
pub const STOPPED: &str = "Execution stopped by user.";

/// Longest argument or output excerpt copied into step content
const STEP_PREVIEW_CHARS: usize = 200;

/// Per-run state. Reset at the start of every `execute`.
#[derive(Default)]
struct RunData {
    steps: StepLog,
    messages: Vec<Message>,
    files_changed: BTreeSet<String>,
    iteration: u32,
}

/// How a run ended
struct Outcome {
    state: EngineState,
    summary: String,
}

impl Outcome {
    fn new(state: EngineState, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
        }
    }
}

/// Drives one instruction to completion by alternating model calls and tool
/// dispatch. One run at a time per engine.
pub struct ExecutionEngine {
    model: Arc<dyn ChatModel>,
    executor: Arc<Executor>,
    workspace: Arc<dyn Workspace>,
    gate: Arc<PermissionGate>,
    bridge: Bridge,
    observer: Arc<dyn ExecutionObserver>,
    workflows: WorkflowMatcher,
    config: EngineConfig,
    state: Mutex<EngineState>,
    stop_requested: AtomicBool,
    run: Mutex<RunData>,
}

/// Marks the run failed if the `execute` future is dropped mid-run
struct RunGuard<'a> {
    engine: &'a ExecutionEngine,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.lock_state();
        if *state == EngineState::Running {
            *state = EngineState::Failed;
        }
    }
}

impl ExecutionEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        executor: Arc<Executor>,
        workspace: Arc<dyn Workspace>,
        gate: Arc<PermissionGate>,
        config: EngineConfig,
    ) -> Self {
        Self {
            model,
            executor,
            workspace,
            gate,
            bridge: Bridge::detached(),
            observer: Arc::new(NoopObserver),
            workflows: WorkflowMatcher::builtin(),
            config,
            state: Mutex::new(EngineState::Idle),
            stop_requested: AtomicBool::new(false),
            run: Mutex::new(RunData::default()),
        }
    }

    pub fn with_bridge(mut self, bridge: Bridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `instruction` to completion and return the final summary.
    ///
    /// Never fails: model errors, cap exhaustion and stop requests all end in
    /// a descriptive string. A call made while another run is active returns
    /// [`ALREADY_RUNNING`] without touching that run.
    pub async fn execute(&self, instruction: &str) -> String {
        {
            let mut state = self.lock_state();
            if *state == EngineState::Running {
                warn!("execute called while a run is active");
                return ALREADY_RUNNING.to_string();
            }
            self.stop_requested.store(false, Ordering::SeqCst);
            *state = EngineState::Running;
        }
        let _guard = RunGuard { engine: self };

        info!(instruction = %instruction, "starting execution");
        let outcome = self.run(instruction).await;
        info!(state = ?outcome.state, "execution finished");

        *self.lock_state() = outcome.state;
        outcome.summary
    }

    /// Ask the active run to end at the next checkpoint
    pub fn stop(&self) {
        if self.is_executing() {
            info!("stop requested");
            self.stop_requested.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_executing(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn state(&self) -> EngineState {
        *self.lock_state()
    }

    /// Snapshot of the step log of the current or last run
    pub fn steps(&self) -> Vec<ExecutionStep> {
        self.lock_run().steps.steps().to_vec()
    }

    /// Snapshot of the conversation of the current or last run
    pub fn messages(&self) -> Vec<Message> {
        self.lock_run().messages.clone()
    }

    /// Paths mutated by successful tools, sorted and deduplicated
    pub fn files_changed(&self) -> Vec<String> {
        self.lock_run().files_changed.iter().cloned().collect()
    }

    /// Iterations consumed by the current or last run
    pub fn iteration(&self) -> u32 {
        self.lock_run().iteration
    }

    async fn run(&self, instruction: &str) -> Outcome {
        *self.lock_run() = RunData::default();

        let ctx = ToolContext::new(
            self.workspace.clone(),
            self.gate.clone(),
            self.bridge.clone(),
        )
        .auto_confirm(self.config.auto_confirm_destructive);
        let schemas = self.executor.tool_schemas();

        let system = prompt::system_prompt(
            &self.config.system_prompt,
            &self.executor.tool_definitions(),
        );
        let first = self.first_user_message(instruction).await;
        self.push_message(Message::system(system));
        self.push_message(Message::user(first));
        self.record(StepKind::Message, format!("Goal: {}", instruction), None, None);

        for iteration in 1..=self.config.max_iterations {
            if self.stop_requested() {
                return self.stopped();
            }
            self.lock_run().iteration = iteration;
            info!(iteration, "iteration started");
            self.record(
                StepKind::Think,
                format!("Iteration {}: deciding the next action", iteration),
                None,
                None,
            );

            let conversation = self.messages();
            let response = match self.call_model(&conversation, &schemas).await {
                Ok(response) => response,
                Err(EngineError::Timeout(secs)) => {
                    let text = format!("Model call timed out after {}s", secs);
                    warn!(iteration, timeout_secs = secs, "model call timed out");
                    self.record(StepKind::Message, text.clone(), None, None);
                    self.observer.on_error(&text);
                    continue;
                }
                Err(e) => {
                    let text = format!("Error: {}", e);
                    error!(iteration, error = %e, "model call failed");
                    self.record(StepKind::Message, text.clone(), None, None);
                    self.observer.on_error(&text);
                    return Outcome::new(EngineState::Failed, format!("Execution failed: {}", e));
                }
            };

            if !response.content.trim().is_empty() {
                self.record(StepKind::Message, response.content.clone(), None, None);
            }

            if response.tool_calls.is_empty() {
                self.push_message(Message::assistant(response.content.clone()));
                if response.finish_reason.is_complete() {
                    info!(iteration, "model finished without tool calls");
                    self.observer.on_complete(&response.content);
                    return Outcome::new(EngineState::Completed, response.content);
                }
                debug!(reason = ?response.finish_reason, "response cut short, continuing");
                continue;
            }

            self.push_message(Message::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            let mut failures = 0usize;
            for call in &response.tool_calls {
                self.observer.on_tool_call(call);
                self.record(
                    StepKind::ToolCall,
                    format!("Calling {}({})", call.name, preview(&call.arguments.to_string())),
                    Some(call.clone()),
                    None,
                );

                if call.name == COMPLETE {
                    let summary = completion_summary(&call.arguments);
                    let result = ToolResult::ok(call, summary.clone()).with_duration(0);
                    self.push_message(Message::tool(&call.id, &call.name, summary.clone()));
                    self.record(
                        StepKind::ToolResult,
                        format!("Task complete: {}", summary),
                        None,
                        Some(result),
                    );
                    info!(iteration, "task completed");
                    self.observer.on_complete(&summary);
                    return Outcome::new(EngineState::Completed, summary);
                }

                let result = if call.name == ASK_USER {
                    self.ask_user(call).await
                } else {
                    self.executor
                        .dispatch(call, &ctx, self.config.deadline())
                        .await
                };

                if result.success {
                    if !result.changed_paths.is_empty() {
                        self.lock_run()
                            .files_changed
                            .extend(result.changed_paths.iter().cloned());
                    }
                } else {
                    failures += 1;
                }

                self.push_message(
                    Message::tool(&call.id, &call.name, result.to_content()).failed(!result.success),
                );
                self.observer.on_tool_result(&result);
                let content = if result.success {
                    format!("{} succeeded: {}", call.name, preview(&result.to_content()))
                } else {
                    format!(
                        "{} failed: {}",
                        call.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    )
                };
                self.record(StepKind::ToolResult, content, None, Some(result));

                if self.stop_requested() {
                    return self.stopped();
                }
            }

            if failures > 0 && self.config.enable_reflection {
                self.push_message(Message::user(REFLECTION_PROMPT));
                self.record(
                    StepKind::Think,
                    format!("Reflecting on {} failed tool call(s)", failures),
                    None,
                    None,
                );
            }
        }

        if self.stop_requested() {
            return self.stopped();
        }

        let max = self.config.max_iterations;
        warn!(max_iterations = max, "iteration cap reached");
        let text = format!(
            "Reached the maximum of {} iterations; the task may be incomplete.",
            max
        );
        self.record(StepKind::Message, text.clone(), None, None);
        Outcome::new(EngineState::Completed, text)
    }

    async fn first_user_message(&self, instruction: &str) -> String {
        let workflow = self.workflows.match_message(instruction);
        if let Some(template) = workflow {
            debug!(workflow = %template.name, "workflow matched");
        }

        let summary = if self.workspace.has_workspace() {
            match self.workspace.summary().await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(error = %e, "failed to summarize workspace");
                    None
                }
            }
        } else {
            None
        };

        prompt::user_message(instruction, workflow, summary.as_deref())
    }

    async fn call_model(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, EngineError> {
        let call = self.model.chat(messages, tools);
        match self.config.deadline() {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_secs()))?
                .map_err(EngineError::from),
            None => call.await.map_err(EngineError::from),
        }
    }

    /// `ask_user` waits on the host without a deadline
    async fn ask_user(&self, call: &ToolCall) -> ToolResult {
        match call.arguments.get("question").and_then(|q| q.as_str()) {
            Some(question) => ToolResult::ok(call, self.bridge.ask(question).await),
            None => ToolResult::err(call, "ask_user requires a 'question' string"),
        }
    }

    fn stopped(&self) -> Outcome {
        info!("execution stopped");
        self.record(StepKind::Message, STOPPED, None, None);
        Outcome::new(EngineState::Stopped, STOPPED)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn record(
        &self,
        kind: StepKind,
        content: impl Into<String>,
        tool_call: Option<ToolCall>,
        tool_result: Option<ToolResult>,
    ) {
        let step = self
            .lock_run()
            .steps
            .record(kind, content, tool_call, tool_result);
        self.observer.on_step(&step);
    }

    fn push_message(&self, message: Message) {
        self.lock_run().messages.push(message);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_run(&self) -> MutexGuard<'_, RunData> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= STEP_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(STEP_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let short = preview(&long);
        assert_eq!(short.chars().count(), STEP_PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
