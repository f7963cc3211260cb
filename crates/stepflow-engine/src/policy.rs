//! Loop-exit policies: how routing reacts when a loop step stops looping.

use serde_json::Value;

use stepflow_core::config::LoopExitKind;
use stepflow_core::types::StateMap;

use crate::graph::Graph;
use crate::guard::truthy;
use crate::state::WorkflowState;

/// Decides the final next step after normal transition selection.
pub trait LoopExitPolicy: Send + Sync {
    /// Policy name, for logs.
    fn name(&self) -> &str;

    /// Given the step that just ran, its output and the selected `next`,
    /// return the step to run next (`None` ends the run).
    fn resolve_next(
        &self,
        graph: &Graph,
        current: &str,
        next: Option<String>,
        output: &StateMap,
        state: &WorkflowState,
    ) -> Option<String>;
}

/// Re-routes away from a self-transition once the step reports a falsy
/// `should_loop`, taking the first non-self transition whose guard holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfTransitionExit;

impl LoopExitPolicy for SelfTransitionExit {
    fn name(&self) -> &str {
        "self_transition"
    }

    fn resolve_next(
        &self,
        graph: &Graph,
        current: &str,
        next: Option<String>,
        output: &StateMap,
        state: &WorkflowState,
    ) -> Option<String> {
        if next.as_deref() != Some(current) {
            return next;
        }
        let should_loop = output.get("should_loop").unwrap_or(&Value::Bool(true));
        if truthy(should_loop) {
            return next;
        }
        graph.select_alternate(current, state)
    }
}

/// Never overrides the selected transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoopExit;

impl LoopExitPolicy for NoLoopExit {
    fn name(&self) -> &str {
        "none"
    }

    fn resolve_next(
        &self,
        _graph: &Graph,
        _current: &str,
        next: Option<String>,
        _output: &StateMap,
        _state: &WorkflowState,
    ) -> Option<String> {
        next
    }
}

/// The policy selected by a config value.
pub fn policy_for(kind: LoopExitKind) -> Box<dyn LoopExitPolicy> {
    match kind {
        LoopExitKind::SelfTransition => Box::new(SelfTransitionExit),
        LoopExitKind::None => Box::new(NoLoopExit),
    }
}
