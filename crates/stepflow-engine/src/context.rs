use std::collections::HashMap;

/// Per-run bookkeeping for step execution.
///
/// Loop counters live here rather than on the steps, so a graph can be shared
/// between runs (including concurrent ones) without counters leaking from one
/// run into the next.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    iterations: HashMap<String, u32>,
    steps_executed: usize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the iteration counter for a loop step.
    pub fn next_iteration(&mut self, step: &str) -> u32 {
        let counter = self.iterations.entry(step.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    /// Current iteration count for a step (0 if it never ran).
    pub fn iterations(&self, step: &str) -> u32 {
        self.iterations.get(step).copied().unwrap_or(0)
    }

    /// Reset one loop counter.
    pub fn reset_counter(&mut self, step: &str) {
        self.iterations.remove(step);
    }

    /// Reset every loop counter.
    pub fn reset_all(&mut self) {
        self.iterations.clear();
    }

    pub(crate) fn record_step(&mut self) -> usize {
        self.steps_executed += 1;
        self.steps_executed
    }

    /// Number of steps executed so far in this run.
    pub fn steps_executed(&self) -> usize {
        self.steps_executed
    }
}
