// Engine configuration from the environment

use super::error::EngineConfigError;
use super::EngineConfig;
use tracing::warn;

/// Parse an environment variable, logging a warning if the value is present but invalid.
fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %v, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = EngineConfig::default();

        config.max_iterations = parse_env_var("AGENT_MAX_ITERATIONS", config.max_iterations);
        config.timeout_secs = parse_env_var("AGENT_TIMEOUT_SECS", config.timeout_secs);
        config.auto_confirm_destructive =
            parse_env_var("AGENT_AUTO_CONFIRM", config.auto_confirm_destructive);
        config.enable_reflection =
            parse_env_var("AGENT_ENABLE_REFLECTION", config.enable_reflection);
        if let Ok(prompt) = std::env::var("AGENT_SYSTEM_PROMPT") {
            if !prompt.trim().is_empty() {
                config.system_prompt = prompt;
            }
        }

        config
    }
}

impl EngineConfig {
    /// Reject settings that would make every run fail trivially
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if self.max_iterations == 0 {
            return Err(EngineConfigError::ZeroIterations);
        }
        if self.system_prompt.trim().is_empty() {
            return Err(EngineConfigError::EmptySystemPrompt);
        }
        Ok(())
    }
}
