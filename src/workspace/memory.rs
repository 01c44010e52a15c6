// In-memory virtual workspace
#![allow(dead_code)]

use super::{FileEntry, SearchMatch, Workspace, WorkspaceError, normalize_path};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn add_parents(&mut self, path: &str) {
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            self.dirs.insert(parent.to_string());
            current = parent;
        }
    }

    /// First ancestor of `path` that is stored as a file
    fn file_ancestor(&self, path: &str) -> Option<String> {
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            if self.files.contains_key(parent) {
                return Some(parent.to_string());
            }
            current = parent;
        }
        None
    }
}

/// Virtual workspace held entirely in memory
#[derive(Debug)]
pub struct MemoryWorkspace {
    open: bool,
    tree: RwLock<Tree>,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    /// Empty, open workspace
    pub fn new() -> Self {
        Self {
            open: true,
            tree: RwLock::new(Tree::default()),
        }
    }

    /// Workspace that reports `has_workspace() == false` and refuses every operation
    pub fn closed() -> Self {
        Self {
            open: false,
            tree: RwLock::new(Tree::default()),
        }
    }

    /// Open workspace seeded with files. Invalid paths are skipped.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut tree = Tree::default();
        for (path, content) in files {
            if let Ok(path) = normalize_path(path.as_ref()) {
                tree.add_parents(&path);
                tree.files.insert(path, content.into());
            }
        }
        Self {
            open: true,
            tree: RwLock::new(tree),
        }
    }

    fn ensure_open(&self) -> Result<(), WorkspaceError> {
        if self.open {
            Ok(())
        } else {
            Err(WorkspaceError::NotOpen)
        }
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    fn has_workspace(&self) -> bool {
        self.open
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError> {
        self.ensure_open()?;
        let path = normalize_path(path)?;
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        if tree.dirs.contains(&path) {
            return Err(WorkspaceError::IsDirectory(path));
        }
        Ok(tree.files.get(&path).cloned())
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        self.ensure_open()?;
        let path = normalize_path(path)?;
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        if tree.dirs.contains(&path) {
            return Err(WorkspaceError::IsDirectory(path));
        }
        if let Some(file) = tree.file_ancestor(&path) {
            return Err(WorkspaceError::NotADirectory(file));
        }
        tree.add_parents(&path);
        tree.files.insert(path, content.to_string());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<bool, WorkspaceError> {
        self.ensure_open()?;
        let path = normalize_path(path)?;
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        if tree.files.remove(&path).is_some() {
            return Ok(true);
        }

        // Directories: remove the directory and everything below it
        if tree.dirs.remove(&path) {
            let prefix = format!("{}/", path);
            tree.files.retain(|p, _| !p.starts_with(&prefix));
            tree.dirs.retain(|p| !p.starts_with(&prefix));
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, WorkspaceError> {
        self.ensure_open()?;
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<FileEntry> = tree
            .dirs
            .iter()
            .map(|d| FileEntry {
                path: d.clone(),
                is_dir: true,
                size: 0,
            })
            .chain(tree.files.iter().map(|(p, c)| FileEntry {
                path: p.clone(),
                is_dir: false,
                size: c.len() as u64,
            }))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn search_in_files(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchMatch>, WorkspaceError> {
        self.ensure_open()?;
        let needle = query.to_lowercase();
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());

        let mut matches = Vec::new();
        for (path, content) in &tree.files {
            for (idx, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    matches.push(SearchMatch {
                        path: path.clone(),
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
        let path = normalize_path(path)?;
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        if tree.files.contains_key(&path) {
            return Err(WorkspaceError::InvalidPath(format!(
                "{} already exists as a file",
                path
            )));
        }
        if let Some(file) = tree.file_ancestor(&path) {
            return Err(WorkspaceError::NotADirectory(file));
        }
        tree.add_parents(&path);
        tree.dirs.insert(path);
        Ok(())
    }
}
