//! Guard expressions: a small, closed boolean language over workflow state.
//!
//! Guards are parsed into an [`Expr`] tree once, when the owning step or
//! transition is created, and evaluated with a single binding, `state`, bound
//! to a snapshot of the current state. There are no other names, no
//! built-ins and no calls except `.get(key[, default])`.
//!
//! Supported: literals (numbers, strings, `true`/`false`/`null` and their
//! `True`/`False`/`None` spellings, lists), field access (`state.x`,
//! `state["x"]`, `state.items[0]`), comparisons (`== != < <= > >= in not in`,
//! chainable), `and`/`or`/`not`, and `+ - * / %`.

use thiserror::Error;

use stepflow_core::error::StepflowError;
use stepflow_core::types::StateMap;

mod eval;
mod lexer;
mod parser;

pub use eval::truthy;
pub use parser::{ArithOp, CompareOp, Expr, Parser};

/// Errors raised while parsing or evaluating a guard.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardError {
    #[error("syntax error at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown name '{0}' (only 'state' is available)")]
    UnknownName(String),

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// A guard expression, parsed once and evaluated many times.
///
/// Construction never fails: a guard whose text does not parse keeps its
/// parse error and reports it on every evaluation.
#[derive(Debug, Clone)]
pub struct Guard {
    source: String,
    compiled: Result<Expr, GuardError>,
}

impl Guard {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Parser::parse(&source);
        Self { source, compiled }
    }

    /// Parse strictly, rejecting malformed text.
    pub fn parse(source: impl Into<String>) -> Result<Self, StepflowError> {
        let guard = Self::new(source);
        match &guard.compiled {
            Ok(_) => Ok(guard),
            Err(e) => Err(StepflowError::Guard {
                expr: guard.source.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parse error, if the text did not parse.
    pub fn parse_error(&self) -> Option<&GuardError> {
        self.compiled.as_ref().err()
    }

    /// Evaluate against a state, returning the truthiness of the result.
    pub fn evaluate(&self, state: &StateMap) -> Result<bool, StepflowError> {
        self.evaluate_inner(state).map_err(|e| StepflowError::Guard {
            expr: self.source.clone(),
            message: e.to_string(),
        })
    }

    fn evaluate_inner(&self, state: &StateMap) -> Result<bool, GuardError> {
        let expr = self.compiled.as_ref().map_err(Clone::clone)?;
        let value = eval::Evaluator::new(state).eval(expr)?;
        Ok(truthy(&value))
    }
}
