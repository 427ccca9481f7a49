use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no `{prompt}` statement found in transcript")]
    NoStatements { prompt: String },
}

/// Anything that stops a statement from producing output.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("{0}")]
    Thrown(String),
    #[error("statement timed out after {} s", .0.as_secs())]
    Timeout(Duration),
    #[error("interpreter exited unexpectedly")]
    Exited,
    #[error("malformed reply from interpreter: {0}")]
    Protocol(String),
    #[error("interpreter i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl InterpreterError {
    /// Whether the interpreter process is still usable afterwards.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InterpreterError::Thrown(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("identity pattern is not a valid regex: {0}")]
    BadPattern(#[from] regex::Error),
    #[error("identity pattern must contain a named group `hash`")]
    MissingHashGroup,
    #[error("prompt must not be empty")]
    EmptyPrompt,
}
