pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use definition::{EdgeDefinition, GraphDefinition, NodeDefinition};
pub use error::{Result, StepflowError};
pub use event::EventBus;
pub use traits::{Tool, ToolProvider};
pub use types::*;
