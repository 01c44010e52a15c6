// Workspace module - filesystem collaborator mutated by the tool handlers

pub mod error;
pub mod local;
pub mod memory;

pub use error::WorkspaceError;
pub use local::LocalWorkspace;
pub use memory::MemoryWorkspace;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Paths listed in the workspace summary before truncating
const SUMMARY_MAX_PATHS: usize = 50;

/// A file or directory in the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Workspace-relative path using `/` separators
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// A single line matching a search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line number
    pub line: usize,
    pub text: String,
}

/// Storage the tools operate on.
///
/// Implementations must be read-after-write consistent: a read issued after a
/// completed write observes that write.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Whether a workspace is open at all
    fn has_workspace(&self) -> bool;

    /// Directory on disk backing the workspace, if any
    fn root(&self) -> Option<&Path> {
        None
    }

    /// `Ok(None)` when the file does not exist
    async fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError>;

    /// Create or overwrite a file, creating parent directories as needed
    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;

    /// `Ok(false)` when there was nothing to delete
    async fn delete_file(&self, path: &str) -> Result<bool, WorkspaceError>;

    /// Every file and directory, sorted by path
    async fn list_files(&self) -> Result<Vec<FileEntry>, WorkspaceError>;

    /// Case-insensitive line search over every file, at most `limit` matches
    async fn search_in_files(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchMatch>, WorkspaceError>;

    async fn create_directory(&self, path: &str) -> Result<(), WorkspaceError>;

    /// Short text describing the workspace, appended to the first prompt
    async fn summary(&self) -> Result<String, WorkspaceError> {
        let entries = self.list_files().await?;
        let files: Vec<&FileEntry> = entries.iter().filter(|e| !e.is_dir).collect();
        let dir_count = entries.len() - files.len();

        let mut out = format!(
            "The workspace contains {} files in {} directories.",
            files.len(),
            dir_count
        );
        for entry in files.iter().take(SUMMARY_MAX_PATHS) {
            out.push_str("\n- ");
            out.push_str(&entry.path);
        }
        if files.len() > SUMMARY_MAX_PATHS {
            out.push_str(&format!(
                "\n... and {} more",
                files.len() - SUMMARY_MAX_PATHS
            ));
        }
        Ok(out)
    }
}

/// Normalize a tool-supplied path to a workspace-relative `a/b/c` form.
///
/// Leading `./` and `/` are dropped; `..` components are rejected so a
/// path can never leave the workspace.
pub fn normalize_path(path: &str) -> Result<String, WorkspaceError> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(WorkspaceError::InvalidPath(path.to_string())),
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(WorkspaceError::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}

/// Like [`normalize_path`] but the empty path means the workspace root
pub fn normalize_prefix(path: &str) -> Result<String, WorkspaceError> {
    if path.split(['/', '\\']).all(|p| p.is_empty() || p == ".") {
        return Ok(String::new());
    }
    normalize_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./src/main.rs").unwrap(), "src/main.rs");
        assert_eq!(normalize_path("/src//lib.rs").unwrap(), "src/lib.rs");
        assert_eq!(normalize_path("a\\b.txt").unwrap(), "a/b.txt");
        assert!(normalize_path("../etc/passwd").is_err());
        assert!(normalize_path("src/../../x").is_err());
        assert!(normalize_path("./").is_err());
    }

    #[test]
    fn test_normalize_prefix_allows_root() {
        assert_eq!(normalize_prefix("").unwrap(), "");
        assert_eq!(normalize_prefix("./").unwrap(), "");
        assert_eq!(normalize_prefix("src/").unwrap(), "src");
    }

    #[tokio::test]
    async fn test_summary_lists_files() {
        let ws = MemoryWorkspace::with_files([("src/main.rs", "fn main() {}"), ("README.md", "#")]);
        let summary = ws.summary().await.unwrap();
        assert!(summary.starts_with("The workspace contains 2 files in 1 directories."));
        assert!(summary.contains("- src/main.rs"));
        assert!(summary.contains("- README.md"));
    }
}
