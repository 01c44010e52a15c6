mod agent;
mod brain;
mod bridge;
mod executor;
mod permission;
mod workflow;
mod workspace;

use agent::{EngineConfig, ExecutionEngine, ExecutionObserver};
use brain::{Brain, BrainConfig, ToolCall};
use bridge::{Bridge, Interaction};
use clap::Parser;
use executor::{Executor, ExecutorConfig, ToolResult, WebConfig};
use permission::{MemoryPermissionStore, PermissionGate, PermissionStore, TomlPermissionStore};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::fmt;
use workspace::{LocalWorkspace, MemoryWorkspace, Workspace};

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "autopilot")]
#[command(about = "Autonomous coding assistant that edits a workspace through tools")]
struct Args {
    /// Project directory to operate on (in-memory workspace when omitted)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Persisted permission modes (default: ~/.autopilot/permissions.toml)
    #[arg(long)]
    permissions: Option<PathBuf>,

    /// TOML file overriding tool descriptions
    #[arg(long)]
    tools_config: Option<PathBuf>,

    /// Override AGENT_MAX_ITERATIONS
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Confirm every `ask` permission without prompting
    #[arg(long)]
    auto_confirm: bool,

    /// Enable the run_command tool
    #[arg(long)]
    allow_shell: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// History file path
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Run a single instruction and exit
    instruction: Option<String>,
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".autopilot"))
        .unwrap_or_else(|| PathBuf::from(".autopilot"))
}

/// Prints progress to the terminal
struct TerminalObserver;

impl ExecutionObserver for TerminalObserver {
    fn on_tool_call(&self, call: &ToolCall) {
        println!("[tool] {} {}", call.name, call.arguments);
    }

    fn on_tool_result(&self, result: &ToolResult) {
        match (&result.error, result.success) {
            (_, true) => println!("[ok] {}", result.name),
            (Some(e), false) => println!("[failed] {}: {}", result.name, e),
            (None, false) => println!("[failed] {}", result.name),
        }
    }

    fn on_error(&self, error: &str) {
        eprintln!("[error] {}", error);
    }
}

/// Read one line from stdin off the async runtime
async fn prompt_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{}", prompt);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}

/// Answer bridge requests on the terminal until the engine side is dropped
async fn serve_bridge(mut rx: mpsc::Receiver<Interaction>) {
    while let Some(interaction) = rx.recv().await {
        match interaction {
            Interaction::Confirm {
                id,
                message,
                details,
                reply,
            } => {
                debug!(id = %id, "confirmation requested");
                if !details.is_empty() {
                    println!("{}", details);
                }
                let answer = prompt_line(format!("{} [y/N] ", message)).await;
                let approved = matches!(answer.as_deref(), Some("y" | "Y" | "yes" | "Yes"));
                if reply.send(approved).is_err() {
                    warn!(id = %id, "confirmation reply dropped");
                }
            }
            Interaction::Ask { id, question, reply } => {
                debug!(id = %id, "question from the model");
                let answer = prompt_line(format!("{}\n? ", question))
                    .await
                    .unwrap_or_default();
                if reply.send(answer).is_err() {
                    warn!(id = %id, "answer reply dropped");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(args.verbose)
        .with_writer(io::stderr)
        .init();

    // Initialize config
    let brain_config = BrainConfig::from_env()?;
    let mut engine_config = EngineConfig::from_env();
    if let Some(max) = args.max_iterations {
        engine_config.max_iterations = max;
    }
    engine_config.auto_confirm_destructive |= args.auto_confirm;
    engine_config.validate()?;

    let executor_config = ExecutorConfig {
        tools_toml_path: args.tools_config.clone(),
        shell_enabled: args.allow_shell,
        web: WebConfig::from_env(),
        ..ExecutorConfig::default()
    };

    info!(
        model = %brain_config.default_model,
        max_iterations = engine_config.max_iterations,
        "Configuration loaded"
    );

    let brain = Brain::new(brain_config)?;
    let executor = Executor::init(executor_config);
    info!(tools = executor.tool_definitions().len(), "Executor initialized");

    let workspace: Arc<dyn Workspace> = match &args.workspace {
        Some(root) => Arc::new(LocalWorkspace::new(root.clone())),
        None => Arc::new(MemoryWorkspace::new()),
    };

    let permissions_path = args
        .permissions
        .clone()
        .unwrap_or_else(|| config_dir().join("permissions.toml"));
    let store: Arc<dyn PermissionStore> = match TomlPermissionStore::load(&permissions_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(path = %permissions_path.display(), error = %e, "Using in-memory permissions");
            Arc::new(MemoryPermissionStore::new())
        }
    };
    let gate = PermissionGate::new(store).with_defaults(executor.default_permissions());

    let (bridge, bridge_rx) = Bridge::channel(8);
    let bridge_handle = tokio::spawn(serve_bridge(bridge_rx));

    let engine = Arc::new(
        ExecutionEngine::new(
            Arc::new(brain),
            Arc::new(executor),
            workspace,
            Arc::new(gate),
            engine_config,
        )
        .with_bridge(bridge)
        .with_observer(Arc::new(TerminalObserver)),
    );

    // Ctrl+C stops the active run; outside a run the line editor handles it
    let signal_engine = engine.clone();
    let signal_handle = tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            signal_engine.stop();
        }
    });

    match args.instruction {
        Some(instruction) => run_once(&engine, &instruction).await,
        None => {
            let history_file = args
                .history_file
                .unwrap_or_else(|| config_dir().join("history"));
            repl(&engine, history_file).await?;
        }
    }

    signal_handle.abort();
    bridge_handle.abort();
    Ok(())
}

async fn run_once(engine: &ExecutionEngine, instruction: &str) {
    let summary = engine.execute(instruction).await;
    println!("\n{}", summary);

    let changed = engine.files_changed();
    if !changed.is_empty() {
        println!("\nFiles changed:");
        for path in changed {
            println!("  {}", path);
        }
    }
}

async fn repl(engine: &ExecutionEngine, history_file: PathBuf) -> io::Result<()> {
    let mut rl: Editor<(), FileHistory> = Editor::new().map_err(io::Error::other)?;

    if history_file.exists()
        && let Err(e) = rl.load_history(&history_file)
    {
        eprintln!("[warning] Failed to load history: {}", e);
    }

    println!("autopilot v{}", env!("CARGO_PKG_VERSION"));
    println!("Describe a task and press Enter. Ctrl+C stops a running task, Ctrl+D quits.");
    println!();

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                run_once(engine, input).await;
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!(error = %e, "Readline error");
                break;
            }
        }
    }

    if let Some(parent) = history_file.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    if let Err(e) = rl.save_history(&history_file) {
        eprintln!("[warning] Failed to save history: {}", e);
    }

    println!("\nGoodbye!");
    Ok(())
}
