use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use stepflow_core::error::Result;
use stepflow_core::event::EventBus;
use stepflow_core::traits::Tool;
use stepflow_core::types::{FlowEvent, StateMap, StepKind};

use crate::context::RunContext;
use crate::guard::Guard;
use crate::state::WorkflowState;

pub use stepflow_core::config::DEFAULT_MAX_ITERATIONS;

/// A named unit of work in a graph.
///
/// Steps are immutable once built. Anything that changes during a run, such
/// as loop counters, lives in the [`RunContext`].
#[derive(Clone)]
pub struct Step {
    name: String,
    kind: StepKind,
    tool: Option<Arc<dyn Tool>>,
    guard: Option<Guard>,
    max_iterations: u32,
}

impl Step {
    /// A function step. Without a tool it produces an empty output.
    pub fn function(name: impl Into<String>) -> Self {
        Self::with_kind(name, StepKind::Function)
    }

    /// A conditional step. Without a guard it reports `condition_result = true`.
    pub fn conditional(name: impl Into<String>) -> Self {
        Self::with_kind(name, StepKind::Conditional)
    }

    /// A loop step that reports `should_loop` until `max_iterations` runs.
    pub fn looping(name: impl Into<String>, max_iterations: u32) -> Self {
        let mut step = Self::with_kind(name, StepKind::Loop);
        step.max_iterations = max_iterations;
        step
    }

    fn with_kind(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tool: None,
            guard: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Attach the tool called by a function step.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Attach a guard expression.
    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(Guard::new(guard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn tool(&self) -> Option<&Arc<dyn Tool>> {
        self.tool.as_ref()
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the step against the current state.
    ///
    /// The step never mutates `state`; the caller merges the returned output.
    /// Tool errors propagate. Guard failures count as false.
    pub async fn execute(
        &self,
        state: &WorkflowState,
        ctx: &mut RunContext,
        events: Option<&EventBus>,
    ) -> Result<StateMap> {
        match self.kind {
            StepKind::Function => match &self.tool {
                Some(tool) => Ok(tool.call(state.snapshot()).await?.unwrap_or_default()),
                None => Ok(StateMap::new()),
            },
            StepKind::Conditional => {
                let result = match &self.guard {
                    Some(guard) => guard_passes(guard, &self.name, state, events),
                    None => true,
                };
                let mut output = StateMap::new();
                output.insert("condition_result".into(), Value::Bool(result));
                Ok(output)
            }
            StepKind::Loop => {
                let iterations = ctx.next_iteration(&self.name);
                let mut should_loop = iterations < self.max_iterations;
                if should_loop {
                    if let Some(guard) = &self.guard {
                        should_loop = guard_passes(guard, &self.name, state, events);
                    }
                }
                let mut output = StateMap::new();
                output.insert("should_loop".into(), Value::Bool(should_loop));
                output.insert("iterations".into(), Value::from(iterations));
                Ok(output)
            }
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tool", &self.tool.as_ref().map(|t| t.name().to_string()))
            .field("guard", &self.guard.as_ref().map(|g| g.source().to_string()))
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// Evaluate a guard, treating any failure as false.
///
/// Failures are logged and, when a bus is attached, published as
/// [`FlowEvent::GuardFailed`] with `owner` as the step name.
pub(crate) fn guard_passes(
    guard: &Guard,
    owner: &str,
    state: &WorkflowState,
    events: Option<&EventBus>,
) -> bool {
    match guard.evaluate(state.as_map()) {
        Ok(result) => result,
        Err(e) => {
            warn!(step = %owner, expr = %guard.source(), error = %e, "Guard evaluation failed, treating as false");
            if let Some(bus) = events {
                bus.publish_with(|| FlowEvent::GuardFailed {
                    step: owner.to_string(),
                    expr: guard.source().to_string(),
                    message: e.to_string(),
                });
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepflow_test_utils::{state_from, ConstTool, FailingTool};

    #[tokio::test]
    async fn test_function_without_tool_is_empty() {
        let step = Step::function("noop");
        let mut ctx = RunContext::new();
        let out = step
            .execute(&WorkflowState::new(), &mut ctx, None)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_function_calls_tool_with_snapshot() {
        let tool = Arc::new(ConstTool::new("const", json!({"answer": 42})));
        let step = Step::function("ask").with_tool(tool);
        let mut ctx = RunContext::new();
        let out = step
            .execute(&WorkflowState::new(), &mut ctx, None)
            .await
            .unwrap();
        assert_eq!(out["answer"], json!(42));
    }

    #[tokio::test]
    async fn test_function_tool_error_propagates() {
        let step = Step::function("boom").with_tool(Arc::new(FailingTool::new("explode")));
        let mut ctx = RunContext::new();
        assert!(step
            .execute(&WorkflowState::new(), &mut ctx, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_conditional_results() {
        let mut ctx = RunContext::new();
        let state = WorkflowState::from(state_from(json!({"x": 9})));

        let out = Step::conditional("c").execute(&state, &mut ctx, None).await.unwrap();
        assert_eq!(out["condition_result"], json!(true));

        let out = Step::conditional("c")
            .with_guard("state.x < 5")
            .execute(&state, &mut ctx, None)
            .await
            .unwrap();
        assert_eq!(out["condition_result"], json!(false));
    }

    #[tokio::test]
    async fn test_conditional_guard_failure_is_false_and_reported() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let mut ctx = RunContext::new();
        let out = Step::conditional("c")
            .with_guard("state.missing > 1")
            .execute(&WorkflowState::new(), &mut ctx, Some(&bus))
            .await
            .unwrap();
        assert_eq!(out["condition_result"], json!(false));

        match rx.recv().await.unwrap() {
            FlowEvent::GuardFailed { step, expr, .. } => {
                assert_eq!(step, "c");
                assert_eq!(expr, "state.missing > 1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_guard_is_false() {
        let mut ctx = RunContext::new();
        let state = WorkflowState::from(state_from(json!({"x": 1})));
        let guard = format!("{}state.x{} > 0", "(".repeat(500), ")".repeat(500));
        let out = Step::conditional("c")
            .with_guard(guard)
            .execute(&state, &mut ctx, None)
            .await
            .unwrap();
        assert_eq!(out["condition_result"], json!(false));
    }

    #[tokio::test]
    async fn test_loop_counts_and_stops() {
        let step = Step::looping("l", 2);
        let mut ctx = RunContext::new();
        let state = WorkflowState::new();

        let first = step.execute(&state, &mut ctx, None).await.unwrap();
        assert_eq!(first["should_loop"], json!(true));
        assert_eq!(first["iterations"], json!(1));

        let second = step.execute(&state, &mut ctx, None).await.unwrap();
        assert_eq!(second["should_loop"], json!(false));
        assert_eq!(second["iterations"], json!(2));
    }

    #[tokio::test]
    async fn test_loop_guard_is_anded() {
        let step = Step::looping("l", 10).with_guard("state.retry");
        let mut ctx = RunContext::new();
        let state = WorkflowState::from(state_from(json!({"retry": false})));
        let out = step.execute(&state, &mut ctx, None).await.unwrap();
        assert_eq!(out["should_loop"], json!(false));
        assert_eq!(ctx.iterations("l"), 1);
    }

    #[test]
    fn test_default_max_iterations() {
        assert_eq!(Step::function("f").max_iterations(), DEFAULT_MAX_ITERATIONS);
    }
}
