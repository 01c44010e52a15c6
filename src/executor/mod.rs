// Executor module - tool registry and handlers
#![allow(unused_imports)]

pub mod config;
pub mod control;
pub mod error;
pub mod fs;
pub mod runner;
pub mod schema;
pub mod shell;
pub mod tool;
pub mod types;
pub mod web;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, Result};
pub use runner::Executor;
pub use tool::{ToolContext, ToolImpl};
pub use types::{ExecutionConstraints, Parameter, ToolDefinition, ToolOutput, ToolResult};
pub use web::WebConfig;
