// Workspace errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("No workspace is open")]
    NotOpen,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
