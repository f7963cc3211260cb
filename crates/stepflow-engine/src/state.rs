use serde::{Deserialize, Serialize};
use serde_json::Value;

use stepflow_core::types::StateMap;

/// Shared state flowing through a workflow run.
///
/// Holds the current key/value data plus a history of snapshots. The history
/// always starts with the initial state and gains one entry per [`update`].
/// Every snapshot is an owned copy, so later mutations never reach back into
/// history.
///
/// [`update`]: WorkflowState::update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    state: StateMap,
    history: Vec<StateMap>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::from_map(StateMap::new())
    }

    /// Create a WorkflowState from initial data.
    pub fn from_map(initial: StateMap) -> Self {
        let history = vec![initial.clone()];
        Self {
            state: initial,
            history,
        }
    }

    /// Get a value by key, or `default` if absent.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.state.get(key).cloned().unwrap_or(default)
    }

    /// Borrow a value by key.
    pub fn get_ref(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Set a single value. Does not record a snapshot.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Merge a patch into the state (patch wins on conflict), then record a
    /// snapshot of the result.
    pub fn update(&mut self, patch: StateMap) {
        for (k, v) in patch {
            self.state.insert(k, v);
        }
        self.history.push(self.state.clone());
    }

    /// Borrow the current state without copying it.
    pub fn as_map(&self) -> &StateMap {
        &self.state
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> StateMap {
        self.state.clone()
    }

    /// Recorded snapshots, oldest first.
    pub fn history(&self) -> &[StateMap] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Consume the state, returning the current data.
    pub fn into_inner(self) -> StateMap {
        self.state
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl From<StateMap> for WorkflowState {
    fn from(initial: StateMap) -> Self {
        Self::from_map(initial)
    }
}
