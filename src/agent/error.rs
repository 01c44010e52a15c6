// Agent errors

use crate::brain::BrainError;
use thiserror::Error;

/// Failures of a single model call inside the loop
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Inference error: {0}")]
    Inference(#[from] BrainError),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),
}

/// Rejected engine configuration
#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("System prompt is empty")]
    EmptySystemPrompt,
}
