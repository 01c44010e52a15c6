// Error types for Executor module

use crate::executor::schema::ValidationError;
use crate::workspace::WorkspaceError;
use thiserror::Error;

/// Executor error types. Every variant ends up as a failed tool result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input for tool '{tool}': {source}")]
    InvalidInput {
        tool: String,
        #[source]
        source: ValidationError,
    },

    #[error("permission denied for '{0}'")]
    PermissionDenied(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("content not found in {0}; old_content must match the file exactly")]
    ContentNotFound(String),

    #[error("{tool} is unavailable: {reason}")]
    Unavailable { tool: String, reason: String },

    #[error("Failed to spawn process for tool '{0}': {1}")]
    SpawnFailed(String, String),

    #[error("Execution timeout for tool '{0}' after {1} seconds")]
    Timeout(String, u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl ExecutorError {
    pub(crate) fn invalid(tool: &str, source: ValidationError) -> Self {
        ExecutorError::InvalidInput {
            tool: tool.to_string(),
            source,
        }
    }
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        ExecutorError::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
