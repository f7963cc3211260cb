use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::Tool;
use stepflow_core::types::StateMap;

/// Wraps a tool so each call fails with `ToolTimeout` after a deadline.
pub struct TimeoutTool {
    inner: Arc<dyn Tool>,
    timeout: Duration,
}

impl TimeoutTool {
    pub fn new(inner: Arc<dyn Tool>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Tool for TimeoutTool {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn description(&self) -> &str {
        self.inner.description()
    }
    fn call(&self, state: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.inner.call(state)).await {
                Ok(result) => result,
                Err(_) => Err(StepflowError::ToolTimeout {
                    tool: self.inner.name().to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }),
            }
        })
    }
}
