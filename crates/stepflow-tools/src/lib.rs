pub mod builtin;
pub mod fn_tool;
pub mod registry;
pub mod timeout;

pub use fn_tool::FnTool;
pub use registry::ToolRegistry;
pub use timeout::TimeoutTool;
