// Tool trait, per-run tool context and description overrides

use crate::bridge::Bridge;
use crate::executor::types::ToolDefinition;
use crate::executor::{ExecutorError, Result, ToolOutput};
use crate::permission::{PermissionGate, PermissionMode};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Internal trait for tool implementations
#[async_trait]
pub trait ToolImpl: Send + Sync {
    /// Get the tool definition (name, description, parameters, default permission)
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with already-validated JSON input
    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Collaborators a handler may touch, injected by the engine
#[derive(Clone)]
pub struct ToolContext {
    pub workspace: Arc<dyn Workspace>,
    pub gate: Arc<PermissionGate>,
    pub bridge: Bridge,
    /// Skip interactive confirmation for `ask` tools; `deny` still wins
    pub auto_confirm: bool,
    /// Raised while a confirmation is outstanding so a dispatch deadline can pause
    pending_confirmation: Option<Arc<watch::Sender<bool>>>,
}

/// Holds the pending flag up for the lifetime of one confirmation
struct PendingConfirmation<'a>(Option<&'a watch::Sender<bool>>);

impl<'a> PendingConfirmation<'a> {
    fn raise(flag: Option<&'a watch::Sender<bool>>) -> Self {
        if let Some(flag) = flag {
            flag.send_replace(true);
        }
        Self(flag)
    }
}

impl Drop for PendingConfirmation<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.0 {
            flag.send_replace(false);
        }
    }
}

impl ToolContext {
    pub fn new(workspace: Arc<dyn Workspace>, gate: Arc<PermissionGate>, bridge: Bridge) -> Self {
        Self {
            workspace,
            gate,
            bridge,
            auto_confirm: false,
            pending_confirmation: None,
        }
    }

    pub fn auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Copy of this context that reports outstanding confirmations on the returned receiver
    pub fn track_confirmations(&self) -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let mut ctx = self.clone();
        ctx.pending_confirmation = Some(Arc::new(tx));
        (ctx, rx)
    }

    /// Fail fast when the tool is denied, without touching the bridge
    pub fn ensure_allowed(&self, tool: &str) -> Result<()> {
        if self.gate.can_execute(tool) {
            Ok(())
        } else {
            info!(tool = %tool, "tool denied by permission configuration");
            Err(ExecutorError::PermissionDenied(tool.to_string()))
        }
    }

    /// Gate a side effect: `deny` fails, `ask` suspends on the bridge.
    ///
    /// Must be called before the handler mutates anything.
    pub async fn authorize(
        &self,
        tool: &str,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Result<()> {
        match self.gate.decide(tool) {
            PermissionMode::Allow => Ok(()),
            PermissionMode::Deny => {
                info!(tool = %tool, "tool denied by permission configuration");
                Err(ExecutorError::PermissionDenied(tool.to_string()))
            }
            PermissionMode::Ask if self.auto_confirm => {
                debug!(tool = %tool, "auto-confirming");
                Ok(())
            }
            PermissionMode::Ask => {
                let approved = {
                    let _pending = PendingConfirmation::raise(self.pending_confirmation.as_deref());
                    self.bridge.confirm(message, details).await
                };
                if approved {
                    Ok(())
                } else {
                    info!(tool = %tool, "confirmation rejected");
                    Err(ExecutorError::PermissionDenied(tool.to_string()))
                }
            }
        }
    }
}

/// Load tool description overrides from a TOML file.
///
/// ```toml
/// [read_file]
/// description = "Read a file from the project"
/// ```
pub fn load_tool_descriptions(path: &std::path::Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "tools.toml not found, using default descriptions");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let config: toml::Table = toml::from_str(&content)?;

    let descriptions: HashMap<String, String> = config
        .iter()
        .filter_map(|(key, value)| {
            value
                .get("description")
                .and_then(|d| d.as_str())
                .map(|s| (key.clone(), s.to_string()))
        })
        .collect();

    debug!(path = %path.display(), tool_count = descriptions.len(), "loaded tool descriptions from config");
    Ok(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_tool_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.toml");
        std::fs::write(
            &path,
            "[read_file]\ndescription = \"Read it\"\n\n[web_search]\nenabled = true\n",
        )
        .unwrap();

        let descriptions = load_tool_descriptions(&path).unwrap();
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions["read_file"], "Read it");
    }

    #[test]
    fn test_missing_tools_toml_is_empty() {
        let descriptions =
            load_tool_descriptions(std::path::Path::new("/no/such/tools.toml")).unwrap();
        assert!(descriptions.is_empty());
    }
}
