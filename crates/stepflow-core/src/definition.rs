//! Declarative graph definitions, as accepted by the HTTP API and the CLI.

use serde::{Deserialize, Serialize};

use crate::types::StepKind;

/// A declarative description of a graph: steps, transitions, entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<EdgeDefinition>,
    pub entry_point: String,
}

/// One step in a [`GraphDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    /// Registered tool name, for function steps.
    #[serde(default)]
    pub tool: Option<String>,
    /// Guard expression.
    #[serde(default)]
    pub condition: Option<String>,
    /// Loop bound; the engine default applies when absent.
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// One transition in a [`GraphDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from_node: String,
    pub to_node: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl NodeDefinition {
    /// A function step calling the named tool.
    pub fn function(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Function,
            tool: Some(tool.into()),
            condition: None,
            max_iterations: None,
        }
    }

    /// A conditional step with the given guard.
    pub fn conditional(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Conditional,
            tool: None,
            condition: Some(condition.into()),
            max_iterations: None,
        }
    }

    /// A loop step bounded by `max_iterations`.
    pub fn looping(name: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Loop,
            tool: None,
            condition: None,
            max_iterations: Some(max_iterations),
        }
    }

    /// Set the guard expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl EdgeDefinition {
    /// Create an unconditional edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_node: from.into(),
            to_node: to.into(),
            condition: None,
        }
    }

    /// Create a guarded edge.
    pub fn guarded(
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from.into(),
            to_node: to.into(),
            condition: Some(condition.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definition_with_defaults() {
        let json = r#"{
            "nodes": [
                {"name": "extract", "tool": "extract_functions"},
                {"name": "again", "type": "loop", "max_iterations": 3},
                {"name": "check", "type": "conditional", "condition": "state.x > 1"}
            ],
            "edges": [
                {"from_node": "extract", "to_node": "again"},
                {"from_node": "again", "to_node": "again", "condition": "state.ok"}
            ],
            "entry_point": "extract"
        }"#;
        let def: GraphDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.nodes.len(), 3);
        assert_eq!(def.nodes[0].kind, StepKind::Function);
        assert_eq!(def.nodes[0].tool.as_deref(), Some("extract_functions"));
        assert_eq!(def.nodes[1].kind, StepKind::Loop);
        assert_eq!(def.nodes[1].max_iterations, Some(3));
        assert_eq!(def.nodes[2].condition.as_deref(), Some("state.x > 1"));
        assert!(def.edges[0].condition.is_none());
        assert_eq!(def.edges[1].condition.as_deref(), Some("state.ok"));
        assert_eq!(def.entry_point, "extract");
    }

    #[test]
    fn test_builders() {
        let node = NodeDefinition::looping("l", 4).with_condition("state.go");
        assert_eq!(node.kind, StepKind::Loop);
        assert_eq!(node.max_iterations, Some(4));
        assert_eq!(node.condition.as_deref(), Some("state.go"));

        let edge = EdgeDefinition::guarded("a", "b", "state.x");
        assert_eq!(edge.from_node, "a");
        assert_eq!(edge.to_node, "b");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"name": "x", "type": "parallel"}"#;
        assert!(serde_json::from_str::<NodeDefinition>(json).is_err());
    }
}
