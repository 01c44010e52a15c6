// Executor configuration

use crate::executor::types::ExecutionConstraints;
use crate::executor::web::WebConfig;
use std::path::PathBuf;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Limits for run_command
    pub constraints: ExecutionConstraints,
    /// Optional tools.toml with description overrides
    pub tools_toml_path: Option<PathBuf>,
    /// Shell path for command execution
    pub shell: String,
    /// Whether run_command may spawn processes at all
    pub shell_enabled: bool,
    pub web: WebConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            constraints: ExecutionConstraints::default(),
            tools_toml_path: None,
            shell: String::from("/bin/sh"),
            shell_enabled: false,
            web: WebConfig::default(),
        }
    }
}
