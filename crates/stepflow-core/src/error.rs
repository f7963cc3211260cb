use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepflowError {
    // Graph construction errors
    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Entry point '{0}' is not a step in this graph")]
    UnknownEntryPoint(String),

    #[error("Transition source '{0}' is not a step in this graph")]
    UnknownStep(String),

    #[error("Transition {from} -> {to} points at a step that does not exist")]
    DanglingTransition { from: String, to: String },

    #[error("Invalid graph definition: {0}")]
    InvalidDefinition(String),

    // Guard errors
    #[error("Guard '{expr}' failed: {message}")]
    Guard { expr: String, message: String },

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    // Lookup errors
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl StepflowError {
    /// Whether this error comes from an invalid graph or definition,
    /// as opposed to a failure while running one.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StepflowError::DuplicateStep(_)
                | StepflowError::UnknownEntryPoint(_)
                | StepflowError::UnknownStep(_)
                | StepflowError::DanglingTransition { .. }
                | StepflowError::InvalidDefinition(_)
                | StepflowError::ToolNotFound(_)
                | StepflowError::Config(_)
                | StepflowError::ConfigNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StepflowError>;
