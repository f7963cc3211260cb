use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use stepflow_core::config::EngineConfig;
use stepflow_core::definition::GraphDefinition;
use stepflow_core::error::{Result, StepflowError};
use stepflow_core::event::EventBus;
use stepflow_core::traits::ToolProvider;
use stepflow_core::types::{FlowEvent, StateMap, StepKind};

use crate::context::RunContext;
use crate::log::LogEntry;
use crate::policy::{policy_for, LoopExitPolicy, SelfTransitionExit};
use crate::state::WorkflowState;
use crate::step::{guard_passes, Step};
use crate::transition::Transition;

pub use stepflow_core::config::DEFAULT_MAX_STEPS;

/// What to do with transitions whose destination is not a known step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DanglingPolicy {
    /// Warn at build time; taking one at run time ends the run.
    #[default]
    Terminate,
    /// Fail the build.
    Reject,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The last step had no next step.
    Completed,
    /// The selected transition pointed at a step that does not exist.
    DanglingTransition { from: String, to: String },
    /// The run executed `cap` steps without terminating on its own.
    StepCapReached { cap: usize },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::DanglingTransition { from, to } => {
                write!(f, "dangling transition {} -> {}", from, to)
            }
            Termination::StepCapReached { cap } => write!(f, "step cap of {} reached", cap),
        }
    }
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub log: Vec<LogEntry>,
    pub steps_executed: usize,
    pub termination: Termination,
}

impl RunOutcome {
    /// Whether the run was stopped by the step cap.
    pub fn hit_step_cap(&self) -> bool {
        matches!(self.termination, Termination::StepCapReached { .. })
    }

    /// The state at the end of the run.
    pub fn final_state(&self) -> StateMap {
        self.state.snapshot()
    }
}

/// A run aborted by a failing step, with everything accumulated before it.
#[derive(Debug, Error)]
#[error("step '{step}' failed: {source}")]
pub struct RunError {
    pub step: String,
    pub source: StepflowError,
    pub state: WorkflowState,
    pub log: Vec<LogEntry>,
    pub steps_executed: usize,
}

/// Collects steps and transitions, then validates them into a [`Graph`].
pub struct GraphBuilder {
    entry_point: String,
    steps: HashMap<String, Step>,
    step_order: Vec<String>,
    transitions: HashMap<String, Vec<Transition>>,
    max_steps: usize,
    loop_exit: Box<dyn LoopExitPolicy>,
    dangling: DanglingPolicy,
    events: Option<Arc<EventBus>>,
}

impl GraphBuilder {
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            steps: HashMap::new(),
            step_order: Vec::new(),
            transitions: HashMap::new(),
            max_steps: DEFAULT_MAX_STEPS,
            loop_exit: Box::new(SelfTransitionExit),
            dangling: DanglingPolicy::default(),
            events: None,
        }
    }

    /// Start a builder from a declarative definition.
    ///
    /// Tool names are resolved through `provider`; engine defaults (loop
    /// bound, step cap, loop-exit policy, strictness) come from `config`.
    pub fn from_definition(
        def: &GraphDefinition,
        provider: &dyn ToolProvider,
        config: &EngineConfig,
    ) -> Result<Self> {
        let mut builder = Self::new(def.entry_point.clone())
            .max_steps(config.max_steps)
            .loop_exit_policy(policy_for(config.loop_exit))
            .dangling_transitions(if config.strict_transitions {
                DanglingPolicy::Reject
            } else {
                DanglingPolicy::Terminate
            });

        for node in &def.nodes {
            if node.name.trim().is_empty() {
                return Err(StepflowError::InvalidDefinition(
                    "step names must not be empty".to_string(),
                ));
            }
            let mut step = match node.kind {
                StepKind::Function => {
                    let step = Step::function(node.name.clone());
                    match &node.tool {
                        Some(tool) => step.with_tool(provider.resolve(tool)?),
                        None => step,
                    }
                }
                StepKind::Conditional => Step::conditional(node.name.clone()),
                StepKind::Loop => Step::looping(
                    node.name.clone(),
                    node.max_iterations.unwrap_or(config.default_max_iterations),
                ),
            };
            if let Some(condition) = &node.condition {
                step = step.with_guard(condition.clone());
            }
            builder.add_step(step)?;
        }

        for edge in &def.edges {
            builder.add_transition(&edge.from_node, &edge.to_node, edge.condition.as_deref())?;
        }

        Ok(builder)
    }

    /// Add a step. Names must be unique.
    pub fn add_step(&mut self, step: Step) -> Result<()> {
        if self.steps.contains_key(step.name()) {
            return Err(StepflowError::DuplicateStep(step.name().to_string()));
        }
        self.step_order.push(step.name().to_string());
        self.steps.insert(step.name().to_string(), step);
        Ok(())
    }

    /// Add a transition out of an existing step.
    ///
    /// Outgoing transitions keep insertion order, which is their priority.
    pub fn add_transition(&mut self, from: &str, to: &str, guard: Option<&str>) -> Result<()> {
        if !self.steps.contains_key(from) {
            return Err(StepflowError::UnknownStep(from.to_string()));
        }
        let transition = match guard {
            Some(guard) => Transition::guarded(from, to, guard),
            None => Transition::always(from, to),
        };
        self.transitions
            .entry(from.to_string())
            .or_default()
            .push(transition);
        Ok(())
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn loop_exit_policy(mut self, policy: Box<dyn LoopExitPolicy>) -> Self {
        self.loop_exit = policy;
        self
    }

    pub fn dangling_transitions(mut self, policy: DanglingPolicy) -> Self {
        self.dangling = policy;
        self
    }

    /// Publish run events on `bus`.
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Validate and produce an immutable graph.
    pub fn build(self) -> Result<Graph> {
        if !self.steps.contains_key(&self.entry_point) {
            return Err(StepflowError::UnknownEntryPoint(self.entry_point));
        }
        if self.max_steps == 0 {
            return Err(StepflowError::InvalidDefinition(
                "max_steps must be at least 1".to_string(),
            ));
        }

        for name in &self.step_order {
            for t in self.transitions.get(name).into_iter().flatten() {
                if !self.steps.contains_key(&t.to) {
                    match self.dangling {
                        DanglingPolicy::Reject => {
                            return Err(StepflowError::DanglingTransition {
                                from: t.from.clone(),
                                to: t.to.clone(),
                            });
                        }
                        DanglingPolicy::Terminate => {
                            warn!(from = %t.from, to = %t.to, "Transition points at unknown step, runs taking it will stop there");
                        }
                    }
                }
                if let Some(err) = t.guard.as_ref().and_then(|g| g.parse_error()) {
                    warn!(from = %t.from, to = %t.to, error = %err, "Transition guard does not parse and will always be false");
                }
            }
            if let Some(err) = self
                .steps
                .get(name)
                .and_then(|s| s.guard())
                .and_then(|g| g.parse_error())
            {
                warn!(step = %name, error = %err, "Step guard does not parse and will always be false");
            }
        }

        let transition_count = self.transitions.values().map(Vec::len).sum();
        debug!(
            entry_point = %self.entry_point,
            steps = self.steps.len(),
            transitions = transition_count,
            loop_exit = self.loop_exit.name(),
            "Graph built"
        );

        Ok(Graph {
            entry_point: self.entry_point,
            steps: self.steps,
            step_order: self.step_order,
            transitions: self.transitions,
            transition_count,
            max_steps: self.max_steps,
            loop_exit: self.loop_exit,
            events: self.events,
        })
    }
}

/// An immutable workflow graph.
///
/// A graph holds no per-run state, so it can be shared behind an `Arc` and
/// run any number of times, concurrently if needed.
pub struct Graph {
    entry_point: String,
    steps: HashMap<String, Step>,
    step_order: Vec<String>,
    transitions: HashMap<String, Vec<Transition>>,
    transition_count: usize,
    max_steps: usize,
    loop_exit: Box<dyn LoopExitPolicy>,
    events: Option<Arc<EventBus>>,
}

impl Graph {
    /// Build a graph from a declarative definition.
    pub fn from_definition(
        def: &GraphDefinition,
        provider: &dyn ToolProvider,
        config: &EngineConfig,
    ) -> Result<Self> {
        GraphBuilder::from_definition(def, provider, config)?.build()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }

    /// Step names in the order they were added.
    pub fn step_names(&self) -> Vec<&str> {
        self.step_order.iter().map(String::as_str).collect()
    }

    /// Outgoing transitions of a step, in priority order.
    pub fn transitions(&self, from: &str) -> &[Transition] {
        self.transitions.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transition_count
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Pick the next step after `current`.
    ///
    /// Takes the first transition whose guard is absent or true. If no guard
    /// holds, falls back to the first declared transition. `None` when the
    /// step has no outgoing transitions.
    pub fn select_next(&self, current: &str, state: &WorkflowState) -> Option<String> {
        let transitions = self.transitions(current);
        transitions
            .iter()
            .find(|t| self.is_open(t, state))
            .or_else(|| transitions.first())
            .map(|t| t.to.clone())
    }

    /// Like [`select_next`](Self::select_next), but skips transitions back
    /// into `current` and has no fallback.
    pub fn select_alternate(&self, current: &str, state: &WorkflowState) -> Option<String> {
        self.transitions(current)
            .iter()
            .filter(|t| !t.is_self_loop())
            .find(|t| self.is_open(t, state))
            .map(|t| t.to.clone())
    }

    fn is_open(&self, transition: &Transition, state: &WorkflowState) -> bool {
        match &transition.guard {
            Some(guard) => guard_passes(guard, &transition.from, state, self.events.as_deref()),
            None => true,
        }
    }

    fn publish(&self, build: impl FnOnce() -> FlowEvent) {
        if let Some(bus) = &self.events {
            bus.publish_with(build);
        }
    }

    /// Execute the graph from the entry point.
    ///
    /// Every call starts from a fresh state, loop counters and log. A failing
    /// tool aborts the run with a [`RunError`] carrying the partial results.
    pub async fn run(&self, initial_state: StateMap) -> std::result::Result<RunOutcome, RunError> {
        let mut state = WorkflowState::from_map(initial_state);
        let mut ctx = RunContext::new();
        let mut log: Vec<LogEntry> = Vec::new();
        let mut current = self.entry_point.clone();

        info!(entry_point = %self.entry_point, max_steps = self.max_steps, "Starting workflow run");
        self.publish(|| FlowEvent::RunStarted {
            entry_point: self.entry_point.clone(),
        });

        let termination = loop {
            let Some(step) = self.steps.get(&current) else {
                // Only reachable if the entry point vanished, which build() rules out.
                break Termination::Completed;
            };

            let output = match step.execute(&state, &mut ctx, self.events.as_deref()).await {
                Ok(output) => output,
                Err(e) => {
                    error!(step = %current, error = %e, "Workflow step failed");
                    self.publish(|| FlowEvent::RunFailed {
                        step: current.clone(),
                        error: e.to_string(),
                    });
                    return Err(RunError {
                        step: current,
                        source: e,
                        state,
                        log,
                        steps_executed: ctx.steps_executed(),
                    });
                }
            };

            let steps_executed = ctx.record_step();
            state.update(output.clone());
            log.push(LogEntry::new(current.clone(), state.snapshot(), output.clone()));
            debug!(step = %current, kind = %step.kind(), steps_executed, "Step complete");
            self.publish(|| FlowEvent::StepCompleted {
                step: current.clone(),
                index: log.len() - 1,
                output: output.clone(),
            });

            let selected = self.select_next(&current, &state);
            let next = self
                .loop_exit
                .resolve_next(self, &current, selected.clone(), &output, &state);
            if next != selected {
                debug!(step = %current, next = ?next, policy = self.loop_exit.name(), "Loop exited");
                self.publish(|| FlowEvent::LoopExited {
                    step: current.clone(),
                    next: next.clone(),
                });
            }

            match next {
                None => break Termination::Completed,
                Some(to) if !self.steps.contains_key(&to) => {
                    warn!(from = %current, to = %to, "Transition into unknown step, stopping run");
                    break Termination::DanglingTransition { from: current, to };
                }
                Some(to) => {
                    if steps_executed >= self.max_steps {
                        warn!(cap = self.max_steps, step = %current, "Step cap reached, stopping run");
                        break Termination::StepCapReached { cap: self.max_steps };
                    }
                    current = to;
                }
            }
        };

        let steps_executed = ctx.steps_executed();
        info!(steps_executed, termination = %termination, "Workflow run finished");
        self.publish(|| FlowEvent::RunFinished {
            steps_executed,
            termination: termination.to_string(),
        });

        Ok(RunOutcome {
            state,
            log,
            steps_executed,
            termination,
        })
    }
}
