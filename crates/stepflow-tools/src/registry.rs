use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::{Tool, ToolProvider};
use stepflow_core::types::{StateMap, ToolDefinition};

use crate::timeout::TimeoutTool;

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: None,
        }
    }

    /// Wrap every resolved tool in a per-call timeout.
    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout = timeout_secs.map(Duration::from_secs);
        self
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name, unwrapped.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names and descriptions of all tools, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Call a tool by name against a state, applying the registry timeout.
    pub async fn execute(&self, name: &str, state: StateMap) -> Result<Option<StateMap>> {
        self.resolve(name)?.call(state).await
    }

    /// Create a registry with all built-in tools registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // ── Code review (5) ─────────────────────────────────────
        registry.register(crate::builtin::code_review::ExtractFunctionsTool);
        registry.register(crate::builtin::code_review::CheckComplexityTool);
        registry.register(crate::builtin::code_review::DetectIssuesTool);
        registry.register(crate::builtin::code_review::SuggestImprovementsTool);
        registry.register(crate::builtin::code_review::QualityScoreTool);

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for ToolRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        let tool = self
            .get(name)
            .ok_or_else(|| StepflowError::ToolNotFound(name.to_string()))?;
        Ok(match self.timeout {
            Some(timeout) => Arc::new(TimeoutTool::new(tool, timeout)),
            None => tool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepflow_test_utils::{state_from, ConstTool, PendingTool};

    #[test]
    fn test_register_get_unregister() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(ConstTool::new("b", json!({})));
        registry.register(ConstTool::new("a", json!({})));

        assert_eq!(registry.list(), vec!["a", "b"]);
        assert!(registry.get("a").is_some());
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::new();
        match registry.resolve("ghost") {
            Err(StepflowError::ToolNotFound(name)) => assert_eq!(name, "ghost"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("resolved an unregistered tool"),
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.list(),
            vec![
                "calculate_quality_score",
                "check_complexity",
                "detect_issues",
                "extract_functions",
                "suggest_improvements",
            ]
        );
        let defs = registry.definitions();
        assert_eq!(defs.len(), 5);
        assert!(defs.iter().all(|d| !d.description.is_empty()));
    }

    #[tokio::test]
    async fn test_execute_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(ConstTool::new("answer", json!({"value": 42})));
        let out = registry
            .execute("answer", state_from(json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out["value"], json!(42));
    }

    #[tokio::test]
    async fn test_resolve_applies_timeout() {
        let mut registry = ToolRegistry::new().with_timeout(Some(1));
        registry.register(PendingTool::new("stuck"));
        let result = registry.execute("stuck", StateMap::new()).await;
        assert!(matches!(
            result,
            Err(StepflowError::ToolTimeout { timeout_secs: 1, .. })
        ));
    }
}
