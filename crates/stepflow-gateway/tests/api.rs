use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use stepflow_core::config::AppConfig;
use stepflow_core::event::EventBus;
use stepflow_gateway::{router, AppState};
use stepflow_test_utils::FailingTool;
use stepflow_tools::ToolRegistry;

fn app() -> Router {
    let mut registry = ToolRegistry::with_builtins();
    registry.register(FailingTool::new("explode"));
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(registry),
        Arc::new(EventBus::default()),
    );
    router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn code_review_graph() -> Value {
    json!({
        "name": "code_review",
        "graph": {
            "nodes": [
                {"name": "extract", "type": "function", "tool": "extract_functions"},
                {"name": "complexity", "tool": "check_complexity"},
                {"name": "issues", "tool": "detect_issues"},
                {"name": "suggest", "tool": "suggest_improvements"},
                {"name": "quality", "tool": "calculate_quality_score"}
            ],
            "edges": [
                {"from_node": "extract", "to_node": "complexity"},
                {"from_node": "complexity", "to_node": "issues"},
                {"from_node": "issues", "to_node": "suggest"},
                {"from_node": "suggest", "to_node": "quality"}
            ],
            "entry_point": "extract"
        }
    })
}

#[tokio::test]
async fn test_index_and_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["run_graph"], "POST /graph/run");

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_tools_sorted() {
    let app = app();
    let (status, body) = send(&app, "GET", "/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    let tools: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    let mut sorted = tools.clone();
    sorted.sort_unstable();
    assert_eq!(tools, sorted);
    assert!(tools.contains(&"extract_functions"));
}

#[tokio::test]
async fn test_create_run_and_fetch_state() {
    let app = app();

    let (status, created) = send(&app, "POST", "/graph/create", Some(code_review_graph())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "code_review");
    assert_eq!(created["nodes"], 5);
    assert_eq!(created["edges"], 4);
    let graph_id = created["graph_id"].as_str().unwrap().to_string();

    let (status, graphs) = send(&app, "GET", "/graphs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graphs["graphs"][&graph_id], "code_review");

    let (status, run) = send(
        &app,
        "POST",
        "/graph/run",
        Some(json!({"graph_id": graph_id, "initial_state": {"code": "def f():\n    pass"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "completed");
    assert_eq!(run["termination"]["reason"], "completed");
    assert_eq!(run["steps_executed"], 5);
    assert_eq!(run["final_state"]["functions"], json!(["f"]));
    assert_eq!(run["execution_log"].as_array().unwrap().len(), 5);
    assert_eq!(run["execution_log"][0]["node"], "extract");

    let run_id = run["run_id"].as_str().unwrap();
    let (status, stored) = send(&app, "GET", &format!("/graph/state/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["status"], "completed");
    assert_eq!(stored["state"]["function_count"], 1);
}

#[tokio::test]
async fn test_default_graph_name() {
    let app = app();
    let mut body = code_review_graph();
    body.as_object_mut().unwrap().remove("name");
    let (status, created) = send(&app, "POST", "/graph/create", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "unnamed_graph");
}

#[tokio::test]
async fn test_create_with_unknown_tool_is_bad_request() {
    let app = app();
    let body = json!({
        "graph": {
            "nodes": [{"name": "a", "tool": "does_not_exist"}],
            "edges": [],
            "entry_point": "a"
        }
    });
    let (status, err) = send(&app, "POST", "/graph/create", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["detail"].as_str().unwrap().contains("does_not_exist"));
}

#[tokio::test]
async fn test_create_with_bad_entry_point_is_bad_request() {
    let app = app();
    let body = json!({
        "graph": {"nodes": [{"name": "a"}], "edges": [], "entry_point": "b"}
    });
    let (status, _) = send(&app, "POST", "/graph/create", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_unknown_graph_is_not_found() {
    let app = app();
    let (status, err) = send(
        &app,
        "POST",
        "/graph/run",
        Some(json!({"graph_id": "missing"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(err["detail"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let app = app();
    let (status, _) = send(&app, "GET", "/graph/state/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_run_is_stored() {
    let app = app();
    let body = json!({
        "name": "doomed",
        "graph": {
            "nodes": [
                {"name": "extract", "tool": "extract_functions"},
                {"name": "boom", "tool": "explode"}
            ],
            "edges": [{"from_node": "extract", "to_node": "boom"}],
            "entry_point": "extract"
        }
    });
    let (_, created) = send(&app, "POST", "/graph/create", Some(body)).await;
    let graph_id = created["graph_id"].as_str().unwrap().to_string();

    let (status, err) = send(
        &app,
        "POST",
        "/graph/run",
        Some(json!({"graph_id": graph_id, "initial_state": {"code": "def g(): pass"}})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err["detail"].as_str().unwrap().contains("boom"));

    let run_id = err["run_id"].as_str().unwrap();
    let (status, stored) = send(&app, "GET", &format!("/graph/state/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["status"], "failed");
    assert_eq!(stored["execution_log"].as_array().unwrap().len(), 1);
    assert_eq!(stored["state"]["function_count"], 1);
    assert!(stored["error"].as_str().unwrap().contains("deliberate failure"));
    assert!(stored.get("termination").is_none());
}
