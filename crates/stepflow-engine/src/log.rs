use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stepflow_core::types::StateMap;

/// One record in a run's execution log, appended after each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Name of the step that ran.
    pub node: String,
    pub timestamp: DateTime<Utc>,
    /// Copy of the state right after the step's output was merged.
    pub state_snapshot: StateMap,
    /// The step's raw output.
    pub output: StateMap,
}

impl LogEntry {
    pub fn new(node: impl Into<String>, state_snapshot: StateMap, output: StateMap) -> Self {
        Self {
            node: node.into(),
            timestamp: Utc::now(),
            state_snapshot,
            output,
        }
    }
}
