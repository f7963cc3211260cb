//! Code review tools: a small static analysis pipeline over `state.code`.
//!
//! Each tool reads what it needs from state and returns only the keys it
//! produces. [`workflow_definition`] wires them into a linear graph.

use futures::future::BoxFuture;
use serde_json::{json, Value};

use stepflow_core::definition::{EdgeDefinition, GraphDefinition, NodeDefinition};
use stepflow_core::error::Result;
use stepflow_core::traits::Tool;
use stepflow_core::types::StateMap;

/// Files longer than this many lines are flagged.
const MAX_FILE_LINES: usize = 100;

fn code(state: &StateMap) -> &str {
    state.get("code").and_then(Value::as_str).unwrap_or("")
}

fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

fn number(state: &StateMap, key: &str, default: f64) -> f64 {
    state.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn output(value: Value) -> Option<StateMap> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

// ── ExtractFunctionsTool ────────────────────────────────────────

pub struct ExtractFunctionsTool;

/// Names of `def` statements, in source order.
pub fn extract_functions(code: &str) -> Vec<String> {
    code.split('\n')
        .filter(|line| line.trim().starts_with("def "))
        .filter_map(|line| line.split_once("def "))
        .map(|(_, rest)| rest.split('(').next().unwrap_or(rest).to_string())
        .collect()
}

impl Tool for ExtractFunctionsTool {
    fn name(&self) -> &str {
        "extract_functions"
    }
    fn description(&self) -> &str {
        "Extract function names from state.code."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let functions = extract_functions(code(&state));
            Ok(output(json!({
                "function_count": functions.len(),
                "functions": functions,
            })))
        })
    }
}

// ── CheckComplexityTool ─────────────────────────────────────────

pub struct CheckComplexityTool;

impl Tool for CheckComplexityTool {
    fn name(&self) -> &str {
        "check_complexity"
    }
    fn description(&self) -> &str {
        "Score complexity from line count (lines / 10, capped at 10)."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let lines = line_count(code(&state));
            let complexity_score = (lines as f64 / 10.0).min(10.0);
            Ok(output(json!({
                "complexity_score": complexity_score,
                "lines_of_code": lines,
            })))
        })
    }
}

// ── DetectIssuesTool ────────────────────────────────────────────

pub struct DetectIssuesTool;

/// Simple textual issue checks.
pub fn detect_issues(code: &str) -> Vec<String> {
    let mut issues = Vec::new();
    if code.contains("TODO") {
        issues.push("Contains TODO comments".to_string());
    }
    if code.contains("print(") {
        issues.push("Contains print statements".to_string());
    }
    if line_count(code) > MAX_FILE_LINES {
        issues.push(format!("File too long (>{} lines)", MAX_FILE_LINES));
    }
    issues
}

impl Tool for DetectIssuesTool {
    fn name(&self) -> &str {
        "detect_issues"
    }
    fn description(&self) -> &str {
        "Flag TODO comments, print statements and overly long files."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let issues = detect_issues(code(&state));
            Ok(output(json!({
                "issue_count": issues.len(),
                "issues": issues,
            })))
        })
    }
}

// ── SuggestImprovementsTool ─────────────────────────────────────

pub struct SuggestImprovementsTool;

/// One suggestion per matching rule, per issue.
pub fn suggest_improvements<'a>(issues: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut suggestions = Vec::new();
    for issue in issues {
        if issue.contains("TODO") {
            suggestions.push("Complete TODO items before merging".to_string());
        }
        if issue.contains("print") {
            suggestions.push("Replace print with logging".to_string());
        }
        if issue.contains("too long") {
            suggestions.push("Split into smaller modules".to_string());
        }
    }
    suggestions
}

impl Tool for SuggestImprovementsTool {
    fn name(&self) -> &str {
        "suggest_improvements"
    }
    fn description(&self) -> &str {
        "Turn state.issues into suggestions."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let issues = state
                .get("issues")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            let suggestions = suggest_improvements(issues);
            Ok(output(json!({
                "suggestion_count": suggestions.len(),
                "suggestions": suggestions,
            })))
        })
    }
}

// ── QualityScoreTool ────────────────────────────────────────────

pub struct QualityScoreTool;

/// `max(0, 10 - issue_count - complexity / 2)`.
pub fn quality_score(issue_count: f64, complexity: f64) -> f64 {
    (10.0 - issue_count - complexity / 2.0).max(0.0)
}

impl Tool for QualityScoreTool {
    fn name(&self) -> &str {
        "calculate_quality_score"
    }
    fn description(&self) -> &str {
        "Combine issue count and complexity into a 0-10 quality score."
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let score = quality_score(
                number(&state, "issue_count", 0.0),
                number(&state, "complexity_score", 5.0),
            );
            Ok(output(json!({
                "quality_score": score,
                "quality_check_complete": true,
            })))
        })
    }
}

/// The code review pipeline:
/// extract → complexity → issues → suggest → quality.
pub fn workflow_definition() -> GraphDefinition {
    GraphDefinition {
        nodes: vec![
            NodeDefinition::function("extract", "extract_functions"),
            NodeDefinition::function("complexity", "check_complexity"),
            NodeDefinition::function("issues", "detect_issues"),
            NodeDefinition::function("suggest", "suggest_improvements"),
            NodeDefinition::function("quality", "calculate_quality_score"),
        ],
        edges: vec![
            EdgeDefinition::new("extract", "complexity"),
            EdgeDefinition::new("complexity", "issues"),
            EdgeDefinition::new("issues", "suggest"),
            EdgeDefinition::new("suggest", "quality"),
        ],
        entry_point: "extract".to_string(),
    }
}
