pub mod context;
pub mod graph;
pub mod guard;
pub mod log;
pub mod policy;
pub mod state;
pub mod step;
pub mod transition;

pub use context::RunContext;
pub use graph::{DanglingPolicy, Graph, GraphBuilder, RunError, RunOutcome, Termination};
pub use guard::{Guard, GuardError};
pub use log::LogEntry;
pub use policy::{LoopExitPolicy, NoLoopExit, SelfTransitionExit};
pub use state::WorkflowState;
pub use step::Step;
pub use transition::Transition;
