use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::{info, warn};

use stepflow_core::error::StepflowError;
use stepflow_core::types::{GraphId, RunId};
use stepflow_engine::GraphBuilder;

use crate::error::ApiError;
use crate::protocol::{
    CreateGraphRequest, CreateGraphResponse, RunGraphRequest, RunGraphResponse, RunRecord,
    RunStatus,
};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// GET /
pub async fn index() -> Json<Value> {
    Json(serde_json::json!({
        "message": "stepflow workflow engine",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /api/health",
            "create_graph": "POST /graph/create",
            "run_graph": "POST /graph/run",
            "get_state": "GET /graph/state/{run_id}",
            "list_graphs": "GET /graphs",
            "list_tools": "GET /tools",
        }
    }))
}

// GET /api/health
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /graph/create
pub async fn create_graph(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateGraphRequest>,
) -> ApiResult<CreateGraphResponse> {
    let graph = GraphBuilder::from_definition(&body.graph, &*state.registry, &state.config.engine)?
        .event_bus(state.event_bus.clone())
        .build()?;

    let nodes = body.graph.nodes.len();
    let edges = body.graph.edges.len();
    let graph_id = state
        .store
        .save_graph(body.name.clone(), body.graph, graph)
        .await;
    info!(graph_id = %graph_id, name = %body.name, nodes, edges, "Graph created");

    Ok(Json(CreateGraphResponse {
        graph_id: graph_id.to_string(),
        name: body.name,
        nodes,
        edges,
    }))
}

// POST /graph/run
pub async fn run_graph(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunGraphRequest>,
) -> ApiResult<RunGraphResponse> {
    let stored = state
        .store
        .get_graph(&GraphId::from_string(&body.graph_id))
        .await
        .ok_or_else(|| StepflowError::GraphNotFound(body.graph_id.clone()))?;

    let run_id = RunId::new();
    info!(run_id = %run_id, graph_id = %body.graph_id, "Running graph");

    match stored.graph.run(body.initial_state).await {
        Ok(outcome) => {
            let final_state = outcome.final_state();
            state
                .store
                .save_run(
                    run_id.clone(),
                    RunRecord {
                        state: final_state.clone(),
                        status: RunStatus::Completed,
                        execution_log: outcome.log.clone(),
                        termination: Some(outcome.termination.clone()),
                        error: None,
                    },
                )
                .await;

            Ok(Json(RunGraphResponse {
                run_id: run_id.to_string(),
                final_state,
                execution_log: outcome.log,
                status: RunStatus::Completed,
                termination: outcome.termination,
                steps_executed: outcome.steps_executed,
            }))
        }
        Err(err) => {
            let detail = err.to_string();
            warn!(run_id = %run_id, step = %err.step, error = %err.source, "Run failed");
            state
                .store
                .save_run(
                    run_id.clone(),
                    RunRecord {
                        state: err.state.snapshot(),
                        status: RunStatus::Failed,
                        execution_log: err.log,
                        termination: None,
                        error: Some(detail.clone()),
                    },
                )
                .await;
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, detail).with_run_id(run_id.to_string()))
        }
    }
}

// GET /graph/state/{run_id}
pub async fn get_run_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> ApiResult<RunRecord> {
    state
        .store
        .get_run(&RunId::from_string(&run_id))
        .await
        .map(Json)
        .ok_or_else(|| StepflowError::RunNotFound(run_id).into())
}

// GET /graphs
pub async fn list_graphs(State(state): State<Arc<AppState>>) -> Json<Value> {
    let graphs = state.store.list_graphs().await;
    Json(serde_json::json!({ "graphs": graphs }))
}

// GET /tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({ "tools": state.registry.list() }))
}
