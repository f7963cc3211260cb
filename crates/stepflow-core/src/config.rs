use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepflowError};

/// Step cap applied to a run when none is configured.
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Loop bound used when a loop step does not give one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Top-level stepflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Loop-exit strategy applied when a loop step selects its own transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExitKind {
    /// Skip self-transitions once the step reports `should_loop = false`.
    #[default]
    SelfTransition,
    /// Never override the selected transition.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on steps executed in a single run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Loop bound used when a definition does not give one.
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u32,
    /// Reject transitions into unknown steps at build time.
    #[serde(default)]
    pub strict_transitions: bool,
    #[serde(default)]
    pub loop_exit: LoopExitKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            default_max_iterations: default_max_iterations(),
            strict_transitions: false,
            loop_exit: LoopExitKind::default(),
        }
    }
}

fn default_max_steps() -> usize { DEFAULT_MAX_STEPS }
fn default_max_iterations() -> u32 { DEFAULT_MAX_ITERATIONS }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout applied to every resolved tool (unset = no timeout).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| StepflowError::ConfigNotFound(path.display().to_string()))?;

        Self::from_toml_str(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| StepflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective config as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_steps == 0 {
            return Err(StepflowError::Config(
                "engine.max_steps must be at least 1".to_string(),
            ));
        }
        if self.tools.timeout_secs == Some(0) {
            return Err(StepflowError::Config(
                "tools.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_STEPFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_STEPFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_STEPFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_STEPFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_STEPFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.engine.default_max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(DEFAULT_MAX_STEPS, 100);
        assert_eq!(DEFAULT_MAX_ITERATIONS, 10);
        assert!(!config.engine.strict_transitions);
        assert_eq!(config.engine.loop_exit, LoopExitKind::SelfTransition);
        assert_eq!(config.gateway.bind, "127.0.0.1:8000");
        assert!(config.tools.timeout_secs.is_none());
    }

    #[test]
    fn test_partial_engine_section() {
        let toml_str = r#"
[engine]
max_steps = 25
loop_exit = "none"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.engine.max_steps, 25);
        assert_eq!(config.engine.default_max_iterations, 10);
        assert_eq!(config.engine.loop_exit, LoopExitKind::None);
    }

    #[test]
    fn test_zero_max_steps_rejected() {
        let err = AppConfig::from_toml_str("[engine]\nmax_steps = 0\n").unwrap_err();
        assert!(matches!(err, StepflowError::Config(_)));
    }

    #[test]
    fn test_round_trip_to_toml() {
        let mut config = AppConfig::default();
        config.tools.timeout_secs = Some(5);
        let rendered = config.to_toml_string().unwrap();
        let parsed = AppConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.tools.timeout_secs, Some(5));
        assert_eq!(parsed.gateway.bind, config.gateway.bind);
    }
}
