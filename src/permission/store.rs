// Permission stores - where per-tool modes are persisted

use super::{PermissionError, PermissionMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Externally persisted per-tool permission configuration
pub trait PermissionStore: Send + Sync {
    /// Configured mode for a tool, `None` when the tool was never configured
    fn mode(&self, tool: &str) -> Option<PermissionMode>;

    fn set_mode(&self, tool: &str, mode: PermissionMode) -> Result<(), PermissionError>;
}

/// Volatile store, used by tests and hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    modes: RwLock<BTreeMap<String, PermissionMode>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modes<I, S>(modes: I) -> Self
    where
        I: IntoIterator<Item = (S, PermissionMode)>,
        S: Into<String>,
    {
        Self {
            modes: RwLock::new(modes.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn mode(&self, tool: &str) -> Option<PermissionMode> {
        let modes = self.modes.read().unwrap_or_else(|e| e.into_inner());
        modes.get(tool).copied()
    }

    fn set_mode(&self, tool: &str, mode: PermissionMode) -> Result<(), PermissionError> {
        let mut modes = self.modes.write().unwrap_or_else(|e| e.into_inner());
        modes.insert(tool.to_string(), mode);
        Ok(())
    }
}

/// On-disk layout of the permissions file
#[derive(Debug, Default, Serialize, Deserialize)]
struct PermissionFile {
    #[serde(default)]
    tools: BTreeMap<String, PermissionMode>,
}

/// TOML-file backed store; every change is written back immediately.
///
/// ```toml
/// [tools]
/// write_file = "ask"
/// run_command = "deny"
/// ```
#[derive(Debug)]
pub struct TomlPermissionStore {
    path: PathBuf,
    modes: RwLock<BTreeMap<String, PermissionMode>>,
}

impl TomlPermissionStore {
    /// Load from `path`; a missing file is an empty configuration
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PermissionError> {
        let path = path.into();

        let modes = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: PermissionFile = toml::from_str(&content)?;
            info!(path = %path.display(), tools = file.tools.len(), "loaded permission modes");
            file.tools
        } else {
            debug!(path = %path.display(), "permissions file not found, using tool defaults");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            modes: RwLock::new(modes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, modes: &BTreeMap<String, PermissionMode>) -> Result<(), PermissionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = PermissionFile {
            tools: modes.clone(),
        };
        std::fs::write(&self.path, toml::to_string_pretty(&file)?)?;
        debug!(path = %self.path.display(), "persisted permission modes");
        Ok(())
    }
}

impl PermissionStore for TomlPermissionStore {
    fn mode(&self, tool: &str) -> Option<PermissionMode> {
        let modes = self.modes.read().unwrap_or_else(|e| e.into_inner());
        modes.get(tool).copied()
    }

    fn set_mode(&self, tool: &str, mode: PermissionMode) -> Result<(), PermissionError> {
        let mut modes = self.modes.write().unwrap_or_else(|e| e.into_inner());
        modes.insert(tool.to_string(), mode);
        self.persist(&modes)
    }
}
