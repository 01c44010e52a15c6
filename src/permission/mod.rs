// Permission module - per-tool allow/deny/ask policy

pub mod error;
pub mod gate;
pub mod store;

pub use error::PermissionError;
pub use gate::PermissionGate;
pub use store::{MemoryPermissionStore, PermissionStore, TomlPermissionStore};

use serde::{Deserialize, Serialize};

/// Policy for a single tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// Runs without asking
    Allow,
    /// Never runs; the confirmation bridge is not consulted
    Deny,
    /// Runs only after interactive confirmation
    Ask,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Allow => "allow",
            PermissionMode::Deny => "deny",
            PermissionMode::Ask => "ask",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(PermissionMode::Allow),
            "deny" => Ok(PermissionMode::Deny),
            "ask" => Ok(PermissionMode::Ask),
            other => Err(PermissionError::InvalidMode(other.to_string())),
        }
    }
}
