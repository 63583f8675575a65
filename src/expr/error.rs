//! Errors raised while parsing or evaluating a formula.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity { name: &'static str, expected: &'static str, actual: usize },
    #[error("'{0}' is not an input of this formula")]
    UnknownInput(String),
    #[error("Cannot apply '{op}' to {detail}")]
    TypeMismatch { op: &'static str, detail: String },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
    #[error("Result is not a finite number")]
    NonFinite,
    #[error("Formula is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("Formula nests deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("Formula produced no value")]
    EmptyResult,
}

impl EvalError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        EvalError::Syntax { position, message: message.into() }
    }
}
