use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key/value data flowing through a workflow run.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Unique graph identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub String);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a step does when executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Calls an attached tool.
    #[default]
    Function,
    /// Evaluates its guard into `condition_result`.
    Conditional,
    /// Counts iterations and reports `should_loop`.
    Loop,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Function => write!(f, "function"),
            StepKind::Conditional => write!(f, "conditional"),
            StepKind::Loop => write!(f, "loop"),
        }
    }
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
}

/// Structured events emitted while a graph runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A run started at the given entry step.
    RunStarted { entry_point: String },
    /// A step finished and its output was merged into state.
    StepCompleted {
        step: String,
        index: usize,
        output: StateMap,
    },
    /// A guard could not be evaluated and was treated as false.
    GuardFailed {
        /// Step owning the guard, or the source step of the transition.
        step: String,
        expr: String,
        message: String,
    },
    /// A loop step stopped looping and routing skipped its self-transition.
    LoopExited {
        step: String,
        next: Option<String>,
    },
    /// A run terminated normally.
    RunFinished {
        steps_executed: usize,
        termination: String,
    },
    /// A step's tool failed and the run was aborted.
    RunFailed { step: String, error: String },
}
