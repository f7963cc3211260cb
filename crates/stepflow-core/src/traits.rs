use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::StateMap;

/// An opaque unit of work attached to a function step.
///
/// A tool receives a copy of the current state and returns the keys it wants
/// merged back. Returning `Ok(None)` is the same as returning an empty map.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used by graph definitions).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Run the tool against a state snapshot.
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>>;
}

/// Resolves tool names to tools at graph-build time.
pub trait ToolProvider: Send + Sync {
    /// Look up a tool, failing with `ToolNotFound` if it is not registered.
    fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>>;
}
