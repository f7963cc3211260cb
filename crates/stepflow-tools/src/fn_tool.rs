use futures::future::BoxFuture;

use stepflow_core::error::Result;
use stepflow_core::traits::Tool;
use stepflow_core::types::StateMap;

type ToolFn = dyn Fn(StateMap) -> Result<Option<StateMap>> + Send + Sync + 'static;

/// Adapts a plain closure into a [`Tool`].
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(StateMap) -> Result<Option<StateMap>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move { (self.func)(state) })
    }
}
