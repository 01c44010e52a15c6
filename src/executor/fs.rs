// Workspace file tools

use crate::executor::schema::{ValidationError, parse};
use crate::executor::tool::{ToolContext, ToolImpl};
use crate::executor::types::{Parameter, ToolDefinition};
use crate::executor::{ExecutorError, Result, ToolOutput};
use crate::permission::PermissionMode;
use crate::workspace::{WorkspaceError, normalize_prefix};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

/// Default and maximum number of search matches returned
const SEARCH_DEFAULT_RESULTS: usize = 50;
const SEARCH_MAX_RESULTS: usize = 200;
/// Characters of new content shown in a confirmation prompt
const PREVIEW_CHARS: usize = 400;

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        out.push_str("\n...");
    }
    out
}

/// Whether a file or directory exists at `path`
async fn exists(ctx: &ToolContext, path: &str) -> Result<bool> {
    match ctx.workspace.read_file(path).await {
        Ok(found) => Ok(found.is_some()),
        Err(WorkspaceError::IsDirectory(_)) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

pub struct ReadFileTool;

#[async_trait]
impl ToolImpl for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "read_file",
            "Read the full content of a file in the workspace.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("path", "Workspace-relative file path"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let PathInput { path } =
            parse(input).map_err(|e| ExecutorError::invalid("read_file", e))?;
        ctx.authorize("read_file", format!("Read {}?", path), "").await?;

        match ctx.workspace.read_file(&path).await? {
            Some(content) => {
                debug!(path = %path, bytes = content.len(), "read file");
                Ok(ToolOutput::success(content))
            }
            None => Err(ExecutorError::NotFound(path)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteInput {
    path: String,
    content: String,
}

pub struct WriteFileTool;

#[async_trait]
impl ToolImpl for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "write_file",
            "Create a file or replace its entire content. Parent directories are created as needed.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("path", "Workspace-relative file path"))
        .param(Parameter::string("content", "Complete new file content"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let WriteInput { path, content } =
            parse(input).map_err(|e| ExecutorError::invalid("write_file", e))?;
        ctx.ensure_allowed("write_file")?;

        let existed = exists(ctx, &path).await?;
        let message = if existed {
            format!("Overwrite existing file {}?", path)
        } else {
            format!("Create file {}?", path)
        };
        ctx.authorize("write_file", message, preview(&content)).await?;

        ctx.workspace.write_file(&path, &content).await?;
        info!(path = %path, bytes = content.len(), overwrite = existed, "file written");

        let verb = if existed { "Updated" } else { "Created" };
        Ok(ToolOutput::success(format!("{} {} ({} bytes)", verb, path, content.len())).changed(path))
    }
}

#[derive(Debug, Deserialize)]
struct EditInput {
    path: String,
    old_content: String,
    new_content: String,
}

/// Exact-substring replacement. The old content must appear verbatim; only
/// the first occurrence is replaced.
pub struct EditFileTool;

#[async_trait]
impl ToolImpl for EditFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "edit_file",
            "Replace the first exact occurrence of old_content with new_content in a file. \
             old_content must match the file byte for byte, including whitespace.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("path", "Workspace-relative file path"))
        .param(Parameter::string("old_content", "Exact text to replace"))
        .param(Parameter::string("new_content", "Replacement text"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let EditInput {
            path,
            old_content,
            new_content,
        } = parse(input).map_err(|e| ExecutorError::invalid("edit_file", e))?;

        if old_content.is_empty() {
            return Err(ExecutorError::invalid(
                "edit_file",
                ValidationError::Malformed("old_content must not be empty".into()),
            ));
        }
        ctx.ensure_allowed("edit_file")?;

        let current = ctx
            .workspace
            .read_file(&path)
            .await?
            .ok_or_else(|| ExecutorError::NotFound(path.clone()))?;

        if !current.contains(&old_content) {
            return Err(ExecutorError::ContentNotFound(path));
        }

        ctx.authorize(
            "edit_file",
            format!("Edit {}?", path),
            format!("- {}\n+ {}", preview(&old_content), preview(&new_content)),
        )
        .await?;

        let updated = current.replacen(&old_content, &new_content, 1);
        ctx.workspace.write_file(&path, &updated).await?;
        info!(path = %path, removed = old_content.len(), added = new_content.len(), "file edited");

        Ok(ToolOutput::success(format!(
            "Edited {}: replaced {} bytes with {} bytes",
            path,
            old_content.len(),
            new_content.len()
        ))
        .changed(path))
    }
}

pub struct DeleteFileTool;

#[async_trait]
impl ToolImpl for DeleteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "delete_file",
            "Delete a file, or a directory and everything in it.",
            PermissionMode::Ask,
        )
        .param(Parameter::string("path", "Workspace-relative path"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let PathInput { path } =
            parse(input).map_err(|e| ExecutorError::invalid("delete_file", e))?;
        ctx.ensure_allowed("delete_file")?;

        if !exists(ctx, &path).await? {
            return Err(ExecutorError::NotFound(path));
        }

        ctx.authorize("delete_file", format!("Delete {}?", path), "This cannot be undone.")
            .await?;

        if !ctx.workspace.delete_file(&path).await? {
            return Err(ExecutorError::NotFound(path));
        }
        info!(path = %path, "deleted");
        Ok(ToolOutput::success(format!("Deleted {}", path)).changed(path))
    }
}

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(default)]
    path: Option<String>,
}

/// Lists workspace entries; also registered as `list_directory`
pub struct ListFilesTool;

#[async_trait]
impl ToolImpl for ListFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "list_files",
            "List files and directories in the workspace, optionally below a directory.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("path", "Directory to list; the whole workspace when omitted").optional())
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let ListInput { path } =
            parse(input).map_err(|e| ExecutorError::invalid("list_files", e))?;
        ctx.authorize("list_files", "List workspace files?", "").await?;

        let prefix = normalize_prefix(path.as_deref().unwrap_or(""))?;
        let dir_prefix = format!("{}/", prefix);

        let lines: Vec<String> = ctx
            .workspace
            .list_files()
            .await?
            .into_iter()
            .filter(|e| prefix.is_empty() || e.path.starts_with(&dir_prefix))
            .map(|e| {
                if e.is_dir {
                    format!("{}/", e.path)
                } else {
                    format!("{} ({} bytes)", e.path, e.size)
                }
            })
            .collect();

        if lines.is_empty() {
            let scope = if prefix.is_empty() { "workspace" } else { prefix.as_str() };
            return Ok(ToolOutput::success(format!("No files found in {}", scope)));
        }
        Ok(ToolOutput::success(lines.join("\n")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

pub struct SearchCodeTool;

#[async_trait]
impl ToolImpl for SearchCodeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_code",
            "Search every file for lines containing the query (case-insensitive).",
            PermissionMode::Allow,
        )
        .param(Parameter::string("query", "Text to search for"))
        .param(Parameter::integer("max_results", "Maximum matches to return (default 50)").optional())
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let SearchInput { query, max_results } =
            parse(input).map_err(|e| ExecutorError::invalid("search_code", e))?;
        if query.trim().is_empty() {
            return Err(ExecutorError::invalid(
                "search_code",
                ValidationError::Malformed("query must not be empty".into()),
            ));
        }
        ctx.authorize("search_code", format!("Search for '{}'?", query), "")
            .await?;

        let limit = max_results
            .unwrap_or(SEARCH_DEFAULT_RESULTS)
            .clamp(1, SEARCH_MAX_RESULTS);
        let matches = ctx.workspace.search_in_files(&query, limit).await?;
        debug!(query = %query, matches = matches.len(), "search complete");

        if matches.is_empty() {
            return Ok(ToolOutput::success(format!("No matches for '{}'", query)));
        }

        let mut out: Vec<String> = matches
            .iter()
            .map(|m| format!("{}:{}: {}", m.path, m.line, m.text))
            .collect();
        if matches.len() >= limit {
            out.push(format!("(showing first {} matches)", limit));
        }
        Ok(ToolOutput::success(out.join("\n")))
    }
}

pub struct CreateDirectoryTool;

#[async_trait]
impl ToolImpl for CreateDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "create_directory",
            "Create a directory, including missing parents.",
            PermissionMode::Allow,
        )
        .param(Parameter::string("path", "Workspace-relative directory path"))
    }

    async fn run(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let PathInput { path } =
            parse(input).map_err(|e| ExecutorError::invalid("create_directory", e))?;
        ctx.authorize("create_directory", format!("Create directory {}?", path), "")
            .await?;

        ctx.workspace.create_directory(&path).await?;
        info!(path = %path, "directory created");
        Ok(ToolOutput::success(format!("Created directory {}", path)).changed(path))
    }
}
