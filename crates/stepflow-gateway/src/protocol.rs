use serde::{Deserialize, Serialize};

use stepflow_core::definition::GraphDefinition;
use stepflow_core::types::StateMap;
use stepflow_engine::{LogEntry, Termination};

fn default_graph_name() -> String {
    "unnamed_graph".to_string()
}

/// Body of `POST /graph/create`.
#[derive(Debug, Deserialize)]
pub struct CreateGraphRequest {
    pub graph: GraphDefinition,
    #[serde(default = "default_graph_name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGraphResponse {
    pub graph_id: String,
    pub name: String,
    pub nodes: usize,
    pub edges: usize,
}

/// Body of `POST /graph/run`.
#[derive(Debug, Deserialize)]
pub struct RunGraphRequest {
    pub graph_id: String,
    #[serde(default)]
    pub initial_state: StateMap,
}

#[derive(Debug, Serialize)]
pub struct RunGraphResponse {
    pub run_id: String,
    pub final_state: StateMap,
    pub execution_log: Vec<LogEntry>,
    pub status: RunStatus,
    pub termination: Termination,
    pub steps_executed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// What the store keeps for each run, served by `GET /graph/state/{run_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub state: StateMap,
    pub status: RunStatus,
    pub execution_log: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
