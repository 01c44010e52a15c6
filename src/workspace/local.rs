// Local-directory workspace backed by tokio::fs

use super::{FileEntry, SearchMatch, Workspace, WorkspaceError, normalize_path};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory names never walked by listing or search
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];
/// Upper bound on entries returned by a single listing
const MAX_ENTRIES: usize = 5000;
/// Files larger than this are skipped by search
const MAX_SEARCH_FILE_BYTES: u64 = 1024 * 1024;

/// Workspace rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a tool path onto disk. The deepest existing ancestor must stay
    /// under the root after symlinks are followed.
    async fn resolve(&self, path: &str) -> Result<(String, PathBuf), WorkspaceError> {
        let rel = normalize_path(path)?;
        let full = self.root.join(&rel);
        let root = tokio::fs::canonicalize(&self.root).await?;

        let mut existing = full.as_path();
        loop {
            match tokio::fs::canonicalize(existing).await {
                Ok(real) if real.starts_with(&root) => break,
                Ok(real) => {
                    warn!(path = %rel, target = %real.display(), "path resolves outside the workspace");
                    return Err(WorkspaceError::InvalidPath(rel));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // A dangling symlink would be followed on write
                    if tokio::fs::symlink_metadata(existing).await.is_ok() {
                        warn!(path = %rel, "path crosses a dangling symlink");
                        return Err(WorkspaceError::InvalidPath(rel));
                    }
                    match existing.parent() {
                        Some(parent) => existing = parent,
                        None => break,
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok((rel, full))
    }

    fn ensure_open(&self) -> Result<(), WorkspaceError> {
        if self.has_workspace() {
            Ok(())
        } else {
            Err(WorkspaceError::NotOpen)
        }
    }

    /// Walk the tree depth-first, returning relative entries sorted by path
    async fn walk(&self) -> Result<Vec<(FileEntry, PathBuf)>, WorkspaceError> {
        let mut entries = Vec::new();
        let mut pending: Vec<(PathBuf, String)> = vec![(self.root.clone(), String::new())];

        while let Some((dir, rel_dir)) = pending.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                    continue;
                }
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await?;
                if file_type.is_symlink() {
                    continue;
                }

                let rel = if rel_dir.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", rel_dir, name)
                };

                if file_type.is_dir() {
                    if SKIPPED_DIRS.contains(&name.as_str()) {
                        continue;
                    }
                    pending.push((entry.path(), rel.clone()));
                    entries.push((
                        FileEntry {
                            path: rel,
                            is_dir: true,
                            size: 0,
                        },
                        entry.path(),
                    ));
                } else {
                    let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                    entries.push((
                        FileEntry {
                            path: rel,
                            is_dir: false,
                            size,
                        },
                        entry.path(),
                    ));
                }

                if entries.len() >= MAX_ENTRIES {
                    warn!(limit = MAX_ENTRIES, "workspace listing truncated");
                    entries.sort_by(|a, b| a.0.path.cmp(&b.0.path));
                    return Ok(entries);
                }
            }
        }

        entries.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        Ok(entries)
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn has_workspace(&self) -> bool {
        self.root.is_dir()
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError> {
        self.ensure_open()?;
        let (rel, full) = self.resolve(path).await?;
        if full.is_dir() {
            return Err(WorkspaceError::IsDirectory(rel));
        }
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        self.ensure_open()?;
        let (rel, full) = self.resolve(path).await?;
        if full.is_dir() {
            return Err(WorkspaceError::IsDirectory(rel));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        debug!(path = %rel, bytes = content.len(), "wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<bool, WorkspaceError> {
        self.ensure_open()?;
        let (rel, full) = self.resolve(path).await?;
        let result = if full.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        match result {
            Ok(()) => {
                debug!(path = %rel, "deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, WorkspaceError> {
        self.ensure_open()?;
        Ok(self.walk().await?.into_iter().map(|(e, _)| e).collect())
    }

    async fn search_in_files(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchMatch>, WorkspaceError> {
        self.ensure_open()?;
        let needle = query.to_lowercase();
        let mut matches = Vec::new();

        for (entry, full) in self.walk().await? {
            if entry.is_dir || entry.size > MAX_SEARCH_FILE_BYTES {
                continue;
            }
            // Binary and non-UTF-8 files are not searchable
            let Ok(content) = tokio::fs::read_to_string(&full).await else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    matches.push(SearchMatch {
                        path: entry.path.clone(),
                        line: idx + 1,
                        text: line.trim().to_string(),
                    });
                    if matches.len() >= limit {
                        return Ok(matches);
                    }
                }
            }
        }
        Ok(matches)
    }

    async fn create_directory(&self, path: &str) -> Result<(), WorkspaceError> {
        self.ensure_open()?;
        let (_, full) = self.resolve(path).await?;
        tokio::fs::create_dir_all(&full).await?;
        Ok(())
    }
}
