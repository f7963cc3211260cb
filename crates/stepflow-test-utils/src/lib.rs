//! Mock tools and fixtures shared by the stepflow test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::{Tool, ToolProvider};
use stepflow_core::types::StateMap;

/// Build a state map from a JSON object literal. Non-objects give an empty map.
pub fn state_from(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        _ => StateMap::new(),
    }
}

// ── ConstTool ───────────────────────────────────────────────────

/// Always returns the same output.
pub struct ConstTool {
    name: String,
    output: StateMap,
}

impl ConstTool {
    pub fn new(name: impl Into<String>, output: Value) -> Self {
        Self {
            name: name.into(),
            output: state_from(output),
        }
    }
}

impl Tool for ConstTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Returns a fixed output."
    }
    fn call(&self, _state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move { Ok(Some(self.output.clone())) })
    }
}

// ── FailingTool ─────────────────────────────────────────────────

/// Always fails with `ToolExecution`.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Fails on every call."
    }
    fn call(&self, _state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            Err(StepflowError::ToolExecution {
                tool: self.name.clone(),
                message: "deliberate failure".to_string(),
            })
        })
    }
}

// ── RecordingTool ───────────────────────────────────────────────

/// Records every state it is called with and returns nothing.
pub struct RecordingTool {
    name: String,
    calls: Mutex<Vec<StateMap>>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// States received so far, in call order.
    pub fn calls(&self) -> Vec<StateMap> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Records its inputs."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(state);
            }
            Ok(None)
        })
    }
}

// ── PendingTool ─────────────────────────────────────────────────

/// Never completes. Useful for exercising timeouts.
pub struct PendingTool {
    name: String,
}

impl PendingTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tool for PendingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Never finishes."
    }
    fn call(&self, _state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(futures::future::pending())
    }
}

// ── StaticToolProvider ──────────────────────────────────────────

/// A fixed set of tools, resolvable by name.
#[derive(Default)]
pub struct StaticToolProvider {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl StaticToolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }
}

impl ToolProvider for StaticToolProvider {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| StepflowError::ToolNotFound(name.to_string()))
    }
}
