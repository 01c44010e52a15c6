// Integration tests for the execution engine
// Run with cargo test --test test_engine

#[path = "../src/agent/mod.rs"]
mod agent;

#[path = "../src/brain/mod.rs"]
mod brain;

#[path = "../src/bridge/mod.rs"]
mod bridge;

#[path = "../src/executor/mod.rs"]
mod executor;

#[path = "../src/permission/mod.rs"]
mod permission;

#[path = "../src/workflow/mod.rs"]
mod workflow;

#[path = "../src/workspace/mod.rs"]
mod workspace;

use agent::{
    EngineConfig, EngineState, ExecutionEngine, ExecutionObserver, StepKind, ALREADY_RUNNING,
    STOPPED,
};
use async_trait::async_trait;
use brain::{BrainError, ChatModel, ChatResponse, FinishReason, Message, Role, ToolCall, ToolSchema};
use bridge::{Bridge, Interaction};
use executor::{Executor, ExecutorConfig, ToolResult};
use permission::{MemoryPermissionStore, PermissionGate, PermissionMode};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use workspace::{FileEntry, MemoryWorkspace, SearchMatch, Workspace, WorkspaceError};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

fn batch(calls: Vec<ToolCall>) -> Result<ChatResponse, BrainError> {
    Ok(ChatResponse::with_tool_calls("", calls))
}

fn complete(id: &str, summary: &str) -> ToolCall {
    call(id, "complete", json!({ "summary": summary }))
}

/// Replays a fixed list of responses, optionally holding the first one back
struct ScriptedModel {
    script: Mutex<VecDeque<Result<ChatResponse, BrainError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
    gate: Option<Arc<Notify>>,
    first_delay: Option<Duration>,
}

impl ScriptedModel {
    fn new(script: Vec<Result<ChatResponse, BrainError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            gate: None,
            first_delay: None,
        }
    }

    /// First call waits until `gate` is notified
    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// First call sleeps before answering
    fn slow_first(mut self, delay: Duration) -> Self {
        self.first_delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<ChatResponse, BrainError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        if n == 0 {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.first_delay {
                tokio::time::sleep(delay).await;
            }
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatResponse::text("script exhausted")))
    }
}

/// Never finishes: every response asks for another listing
struct LoopingModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for LoopingModel {
    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<ChatResponse, BrainError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatResponse::with_tool_calls(
            "still working",
            vec![call(&format!("loop-{}", n), "list_files", json!({}))],
        ))
    }
}

/// Memory workspace that records every mutation
struct RecordingWorkspace {
    inner: MemoryWorkspace,
    writes: Mutex<Vec<(String, String)>>,
    deletes: Mutex<Vec<String>>,
}

impl RecordingWorkspace {
    fn new(inner: MemoryWorkspace) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Workspace for RecordingWorkspace {
    fn has_workspace(&self) -> bool {
        self.inner.has_workspace()
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        self.writes
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string()));
        self.inner.write_file(path, content).await
    }

    async fn delete_file(&self, path: &str) -> Result<bool, WorkspaceError> {
        self.deletes.lock().unwrap().push(path.to_string());
        self.inner.delete_file(path).await
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, WorkspaceError> {
        self.inner.list_files().await
    }

    async fn search_in_files(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchMatch>, WorkspaceError> {
        self.inner.search_in_files(query, limit).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), WorkspaceError> {
        self.inner.create_directory(path).await
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_tool_call(&self, call: &ToolCall) {
        self.events.lock().unwrap().push(format!("call:{}", call.name));
    }

    fn on_tool_result(&self, result: &ToolResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("result:{}:{}", result.name, result.success));
    }

    fn on_complete(&self, summary: &str) {
        self.events.lock().unwrap().push(format!("complete:{}", summary));
    }

    fn on_error(&self, error: &str) {
        self.events.lock().unwrap().push(format!("error:{}", error));
    }
}

/// Bridge served by a task that answers every confirmation with `approve`
/// and every question with "blue". Returns the number of requests seen.
fn scripted_bridge(approve: bool) -> (Bridge, Arc<AtomicUsize>) {
    let (bridge, mut rx) = Bridge::channel(4);
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    tokio::spawn(async move {
        while let Some(interaction) = rx.recv().await {
            seen.fetch_add(1, Ordering::SeqCst);
            match interaction {
                Interaction::Confirm { reply, .. } => {
                    let _ = reply.send(approve);
                }
                Interaction::Ask { reply, .. } => {
                    let _ = reply.send("blue".to_string());
                }
            }
        }
    });
    (bridge, count)
}

fn build_engine(
    model: Arc<dyn ChatModel>,
    workspace: Arc<dyn Workspace>,
    store: MemoryPermissionStore,
    config: EngineConfig,
) -> ExecutionEngine {
    let executor = Executor::init(ExecutorConfig::default());
    let gate = PermissionGate::new(Arc::new(store)).with_defaults(executor.default_permissions());
    ExecutionEngine::new(model, Arc::new(executor), workspace, Arc::new(gate), config)
}

fn tool_results(engine: &ExecutionEngine) -> Vec<ToolResult> {
    engine
        .steps()
        .into_iter()
        .filter_map(|s| s.tool_result)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concrete_scenario() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "notes.txt", "content": "hello" })),
            complete("c2", "done"),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::new()));
        let engine = build_engine(
            model.clone(),
            workspace.clone(),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        let result = engine
            .execute("create a file named notes.txt with content 'hello'")
            .await;

        assert_eq!(result, "done");
        assert_eq!(
            workspace.writes(),
            vec![("notes.txt".to_string(), "hello".to_string())]
        );

        let steps = engine.steps();
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Message,
                StepKind::Think,
                StepKind::ToolCall,
                StepKind::ToolResult,
                StepKind::ToolCall,
                StepKind::ToolResult,
            ]
        );
        assert_eq!(steps[4].tool_call.as_ref().unwrap().name, "complete");
        assert_eq!(steps[5].tool_result.as_ref().unwrap().name, "complete");

        assert_eq!(engine.files_changed(), vec!["notes.txt".to_string()]);
        assert_eq!(engine.state(), EngineState::Completed);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_conversation_shape() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "a.txt", "content": "x" })),
            complete("c2", "ok"),
        ])]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );
        engine.execute("write a.txt").await;

        let messages = engine.messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Tool]
        );
        assert!(messages[0].content.contains("## write_file"));
        assert!(messages[1].content.starts_with("write a.txt"));
        assert_eq!(messages[2].tool_calls.len(), 2);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_and_run_continues() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![
            batch(vec![call("c1", "frobnicate", json!({}))]),
            batch(vec![complete("c2", "recovered")]),
        ]));
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        let result = engine.execute("do something").await;
        assert_eq!(result, "recovered");
        assert_eq!(model.calls(), 2);

        let results = tool_results(&engine);
        let unknown = results.iter().find(|r| r.name == "frobnicate").unwrap();
        assert!(!unknown.success);
        assert!(unknown.error.as_deref().unwrap().contains("frobnicate"));

        // The failure is fed back to the model on the next turn
        let second_turn = &model.seen.lock().unwrap()[1];
        let tool_msg = second_turn.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.starts_with("Error: "));
        assert!(tool_msg.is_error);
    }

    #[tokio::test]
    async fn test_ask_rejected_leaves_workspace_untouched() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "notes.txt", "content": "new" })),
            call("c2", "delete_file", json!({ "path": "notes.txt" })),
            complete("c3", "tried"),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::with_files([(
            "notes.txt",
            "old",
        )])));
        let store = MemoryPermissionStore::with_modes([
            ("write_file", PermissionMode::Ask),
            ("delete_file", PermissionMode::Ask),
        ]);
        let (bridge, asked) = scripted_bridge(false);
        let engine = build_engine(model, workspace.clone(), store, EngineConfig::default())
            .with_bridge(bridge);

        engine.execute("replace then delete notes.txt").await;

        assert!(workspace.writes().is_empty());
        assert!(workspace.deletes().is_empty());
        assert_eq!(
            workspace.read_file("notes.txt").await.unwrap().as_deref(),
            Some("old")
        );
        assert_eq!(asked.load(Ordering::SeqCst), 2);

        let results = tool_results(&engine);
        assert!(results
            .iter()
            .filter(|r| r.name != "complete")
            .all(|r| !r.success));
        assert!(engine.files_changed().is_empty());
    }

    #[tokio::test]
    async fn test_ask_approved_mutates() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "delete_file", json!({ "path": "notes.txt" })),
            complete("c2", "deleted"),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::with_files([(
            "notes.txt",
            "old",
        )])));
        let (bridge, asked) = scripted_bridge(true);
        let engine = build_engine(
            model,
            workspace.clone(),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        )
        .with_bridge(bridge);

        engine.execute("delete notes.txt").await;

        assert_eq!(workspace.deletes(), vec!["notes.txt".to_string()]);
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert_eq!(engine.files_changed(), vec!["notes.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_confirm_skips_bridge() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "delete_file", json!({ "path": "notes.txt" })),
            complete("c2", "deleted"),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::with_files([(
            "notes.txt",
            "old",
        )])));
        let (bridge, asked) = scripted_bridge(false);
        let config = EngineConfig {
            auto_confirm_destructive: true,
            ..EngineConfig::default()
        };
        let engine = build_engine(model, workspace.clone(), MemoryPermissionStore::new(), config)
            .with_bridge(bridge);

        engine.execute("delete notes.txt").await;

        assert_eq!(workspace.deletes(), vec!["notes.txt".to_string()]);
        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deny_never_consults_bridge() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "notes.txt", "content": "new" })),
            call("c2", "delete_file", json!({ "path": "notes.txt" })),
            complete("c3", "blocked"),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::with_files([(
            "notes.txt",
            "old",
        )])));
        let store = MemoryPermissionStore::with_modes([
            ("write_file", PermissionMode::Deny),
            ("delete_file", PermissionMode::Deny),
        ]);
        let (bridge, asked) = scripted_bridge(true);
        let engine = build_engine(model, workspace.clone(), store, EngineConfig::default())
            .with_bridge(bridge);

        engine.execute("overwrite and delete notes.txt").await;

        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(workspace.writes().is_empty());
        assert!(workspace.deletes().is_empty());

        let results = tool_results(&engine);
        for name in ["write_file", "delete_file"] {
            let r = results.iter().find(|r| r.name == name).unwrap();
            assert!(!r.success);
            assert!(r.error.as_deref().unwrap().contains("permission denied"));
        }
    }

    #[tokio::test]
    async fn test_edit_twice_fails_second_time() {
        init_tracing();

        let edit = json!({
            "path": "src/lib.rs",
            "old_content": "let x = 1;",
            "new_content": "let x = 2;"
        });
        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "edit_file", edit.clone()),
            call("c2", "edit_file", edit),
            complete("c3", "edited"),
        ])]));
        let workspace = Arc::new(MemoryWorkspace::with_files([(
            "src/lib.rs",
            "fn main() { let x = 1; }",
        )]));
        let engine = build_engine(
            model,
            workspace.clone(),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.execute("change x to 2").await;

        let results = tool_results(&engine);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("content not found"));
        assert_eq!(
            workspace.read_file("src/lib.rs").await.unwrap().as_deref(),
            Some("fn main() { let x = 2; }")
        );
    }

    #[tokio::test]
    async fn test_write_then_read_in_one_batch() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "a.txt", "content": "A" })),
            call("c2", "read_file", json!({ "path": "a.txt" })),
            complete("c3", "read back"),
        ])]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.execute("write and read a.txt").await;

        let results = tool_results(&engine);
        assert_eq!(results[1].name, "read_file");
        assert!(results[1].success);
        assert_eq!(results[1].output.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_complete_on_first_iteration() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![complete(
            "c1",
            "nothing to do",
        )])]));
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        let result = engine.execute("check the project").await;

        assert_eq!(result, "nothing to do");
        assert_eq!(engine.iteration(), 1);
        assert_eq!(model.calls(), 1);
        assert_eq!(engine.state(), EngineState::Completed);
    }

    #[tokio::test]
    async fn test_complete_without_summary_uses_default() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![call(
            "c1",
            "complete",
            Value::Null,
        )])]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        assert_eq!(engine.execute("finish").await, "Task completed.");
    }

    #[tokio::test]
    async fn test_complete_skips_rest_of_batch() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            complete("c1", "early"),
            call("c2", "write_file", json!({ "path": "late.txt", "content": "x" })),
        ])]));
        let workspace = Arc::new(RecordingWorkspace::new(MemoryWorkspace::new()));
        let engine = build_engine(
            model,
            workspace.clone(),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        assert_eq!(engine.execute("stop early").await, "early");
        assert!(workspace.writes().is_empty());
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        init_tracing();

        let model = Arc::new(LoopingModel {
            calls: AtomicUsize::new(0),
        });
        let config = EngineConfig {
            max_iterations: 3,
            ..EngineConfig::default()
        };
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            config,
        );

        let result = engine.execute("loop forever").await;

        assert!(result.contains("may be incomplete"), "got: {}", result);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.iteration(), 3);
        let thinks = engine
            .steps()
            .iter()
            .filter(|s| s.kind == StepKind::Think)
            .count();
        assert_eq!(thinks, 3);
        assert_eq!(engine.steps().last().unwrap().kind, StepKind::Message);
        assert!(!engine.is_executing());
    }

    #[tokio::test]
    async fn test_plain_text_answer_ends_run() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![Ok(ChatResponse::text(
            "The project has no tests.",
        ))]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        let result = engine.execute("explain the tests").await;
        assert_eq!(result, "The project has no tests.");
        assert_eq!(engine.messages().last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_model_error_fails_run() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![Err(
            BrainError::AuthenticationFailed("bad key".into()),
        )]));
        let observer = Arc::new(RecordingObserver::default());
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        )
        .with_observer(observer.clone());

        let result = engine.execute("anything").await;

        assert!(result.starts_with("Execution failed"), "got: {}", result);
        assert!(result.contains("bad key"));
        assert_eq!(engine.state(), EngineState::Failed);

        let last = engine.steps().last().cloned().unwrap();
        assert_eq!(last.kind, StepKind::Message);
        assert!(last.content.contains("bad key"));
        assert!(observer.events().iter().any(|e| e.starts_with("error:")));
    }

    #[tokio::test]
    async fn test_model_timeout_is_recoverable() {
        init_tracing();

        let model = Arc::new(
            ScriptedModel::new(vec![batch(vec![complete("c1", "after timeout")])])
                .slow_first(Duration::from_secs(3)),
        );
        let observer = Arc::new(RecordingObserver::default());
        let config = EngineConfig {
            timeout_secs: 1,
            ..EngineConfig::default()
        };
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            config,
        )
        .with_observer(observer.clone());

        let result = engine.execute("slow model").await;

        assert_eq!(result, "after timeout");
        assert_eq!(model.calls(), 2);
        assert!(engine
            .steps()
            .iter()
            .any(|s| s.kind == StepKind::Message && s.content.contains("timed out")));
        assert!(observer.events().iter().any(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_ask_user_answer_reaches_model() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![
            batch(vec![call(
                "c1",
                "ask_user",
                json!({ "question": "Which color?" }),
            )]),
            batch(vec![complete("c2", "painted")]),
        ]));
        let (bridge, asked) = scripted_bridge(true);
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        )
        .with_bridge(bridge);

        assert_eq!(engine.execute("paint it").await, "painted");
        assert_eq!(asked.load(Ordering::SeqCst), 1);

        let second_turn = &model.seen.lock().unwrap()[1];
        let answer = second_turn.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(answer.content, "blue");
        assert_eq!(answer.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_ask_user_without_host() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![
            batch(vec![call("c1", "ask_user", json!({ "question": "Name?" }))]),
            batch(vec![complete("c2", "ok")]),
        ]));
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.execute("ask me").await;

        let second_turn = &model.seen.lock().unwrap()[1];
        let answer = second_turn.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(answer.content, bridge::NO_ANSWER);
    }

    #[tokio::test]
    async fn test_reflection_after_failure() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![
            batch(vec![call("c1", "read_file", json!({ "path": "missing.txt" }))]),
            batch(vec![complete("c2", "gave up")]),
        ]));
        let config = EngineConfig {
            enable_reflection: true,
            ..EngineConfig::default()
        };
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            config,
        );

        engine.execute("read missing.txt").await;

        let second_turn = &model.seen.lock().unwrap()[1];
        let last = second_turn.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, agent::prompt::REFLECTION_PROMPT);
        assert!(engine
            .steps()
            .iter()
            .any(|s| s.kind == StepKind::Think && s.content.starts_with("Reflecting")));
    }

    #[tokio::test]
    async fn test_observer_event_order() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![
            call("c1", "write_file", json!({ "path": "a.txt", "content": "x" })),
            complete("c2", "done"),
        ])]));
        let observer = Arc::new(RecordingObserver::default());
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        )
        .with_observer(observer.clone());

        engine.execute("write a.txt").await;

        assert_eq!(
            observer.events(),
            vec![
                "call:write_file",
                "result:write_file:true",
                "call:complete",
                "complete:done",
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_execute_rejected() {
        init_tracing();

        let release = Arc::new(Notify::new());
        let model = Arc::new(
            ScriptedModel::new(vec![batch(vec![complete("c1", "first run")])])
                .gated(release.clone()),
        );
        let engine = Arc::new(build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        ));
        assert_eq!(engine.state(), EngineState::Idle);

        let running = engine.clone();
        let first = tokio::spawn(async move { running.execute("first").await });

        while !engine.is_executing() {
            tokio::task::yield_now().await;
        }
        let steps_before = engine.steps().len();

        assert_eq!(engine.execute("second").await, ALREADY_RUNNING);
        assert_eq!(engine.steps().len(), steps_before);

        release.notify_one();
        assert_eq!(first.await.unwrap(), "first run");
        assert_eq!(engine.state(), EngineState::Completed);
    }

    #[tokio::test]
    async fn test_stop_ends_run_after_tool_result() {
        init_tracing();

        let release = Arc::new(Notify::new());
        let model = Arc::new(
            ScriptedModel::new(vec![
                batch(vec![call("c1", "list_files", json!({}))]),
                batch(vec![complete("c2", "should not reach")]),
            ])
            .gated(release.clone()),
        );
        let engine = Arc::new(build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        ));

        let running = engine.clone();
        let handle = tokio::spawn(async move { running.execute("list files").await });

        while !engine.is_executing() {
            tokio::task::yield_now().await;
        }
        engine.stop();
        release.notify_one();

        assert_eq!(handle.await.unwrap(), STOPPED);
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(model.calls(), 1);
        assert_eq!(engine.steps().last().unwrap().content, STOPPED);
    }

    #[tokio::test]
    async fn test_stop_during_last_model_call_wins_over_cap() {
        init_tracing();

        let release = Arc::new(Notify::new());
        let truncated = ChatResponse {
            content: "partial answer".into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Length,
        };
        let model = Arc::new(ScriptedModel::new(vec![Ok(truncated)]).gated(release.clone()));
        let engine = Arc::new(build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig {
                max_iterations: 1,
                ..Default::default()
            },
        ));

        let running = engine.clone();
        let handle = tokio::spawn(async move { running.execute("write an essay").await });

        while !engine.is_executing() {
            tokio::task::yield_now().await;
        }
        engine.stop();
        release.notify_one();

        assert_eq!(handle.await.unwrap(), STOPPED);
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(model.calls(), 1);
        assert!(!engine
            .steps()
            .iter()
            .any(|s| s.content.contains("may be incomplete")));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_ignored() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![complete("c1", "ran")])]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.stop();
        assert_eq!(engine.execute("go").await, "ran");
    }

    #[tokio::test]
    async fn test_run_state_resets_between_runs() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![
            batch(vec![
                call("c1", "write_file", json!({ "path": "a.txt", "content": "x" })),
                complete("c2", "one"),
            ]),
            batch(vec![complete("c3", "two")]),
        ]));
        let engine = build_engine(
            model,
            Arc::new(MemoryWorkspace::new()),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.execute("first").await;
        assert_eq!(engine.files_changed().len(), 1);

        assert_eq!(engine.execute("second").await, "two");
        assert!(engine.files_changed().is_empty());
        assert_eq!(engine.steps().len(), 4);
        assert_eq!(engine.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_workflow_and_summary_in_first_message() {
        init_tracing();

        let model = Arc::new(ScriptedModel::new(vec![batch(vec![complete("c1", "ok")])]));
        let engine = build_engine(
            model.clone(),
            Arc::new(MemoryWorkspace::with_files([("src/app.rs", "fn app() {}")])),
            MemoryPermissionStore::new(),
            EngineConfig::default(),
        );

        engine.execute("Please fix bug in app").await;

        let first_turn = &model.seen.lock().unwrap()[0];
        let user = &first_turn[1];
        assert!(user.content.contains("Suggested workflow (fix-bug)"));
        assert!(user.content.contains("- src/app.rs"));
    }
}
