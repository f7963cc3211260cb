use std::sync::Arc;

use stepflow_core::config::AppConfig;
use stepflow_core::event::EventBus;
use stepflow_tools::ToolRegistry;

use crate::store::MemoryStore;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ToolRegistry>,
    pub event_bus: Arc<EventBus>,
    pub store: MemoryStore,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            registry,
            event_bus,
            store: MemoryStore::new(),
        }
    }
}
