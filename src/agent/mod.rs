// Agent module - autonomous execution loop over the model and the tool registry
#![allow(unused_imports)]

pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod prompt;
pub mod steps;
pub mod types;

pub use engine::{ExecutionEngine, ALREADY_RUNNING, STOPPED};
pub use observer::ExecutionObserver;
pub use types::{EngineConfig, EngineState, StepKind};
