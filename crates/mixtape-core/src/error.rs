//! Error kinds for the Mixtape engine.
//!
//! Errors are ordinary values, not the only control-flow channel: `catch`
//! (in `mixtape-runtime`) traps any `Error` and converts the `Thrown`
//! variant's payload back into a pushed `Value`. Every other variant
//! surfaces to the host, which displays it on a status line using the
//! attached `SourcePos` when one is available.

use crate::value::Value;
use std::sync::Arc;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A location in source text, used for parse and evaluation diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePos {
    pub file: Arc<str>,
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(file: impl Into<Arc<str>>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// The closed set of error kinds the engine can raise.
///
/// See spec §7. `Thrown` carries the value passed to the `throw` word;
/// every other kind is raised internally by the parser, evaluator, or a
/// primitive word.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("parse error at {pos}: {message}")]
    Parse { message: String, pos: SourcePos },

    #[error("stack underflow: {word} needs {needed} value(s)")]
    ArityUnderflow { word: String, needed: usize },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("word or method not found: {name}")]
    Unbound { name: String },

    #[error("domain error: {message}")]
    DomainError { message: String },

    #[error("thrown: {value:?}")]
    Thrown { value: Value, pos: Option<SourcePos> },

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {message}")]
    Io { message: String },
}

impl Error {
    pub fn parse(message: impl Into<String>, pos: SourcePos) -> Self {
        Error::Parse {
            message: message.into(),
            pos,
        }
    }

    pub fn underflow(word: impl Into<String>, needed: usize) -> Self {
        Error::ArityUnderflow {
            word: word.into(),
            needed,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Error::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn unbound(name: impl Into<String>) -> Self {
        Error::Unbound { name: name.into() }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Error::DomainError {
            message: message.into(),
        }
    }

    pub fn thrown(value: Value) -> Self {
        Error::Thrown { value, pos: None }
    }

    /// The value a `throw`n error carries, if it was user-raised.
    ///
    /// `catch` uses this to decide what to push: a `Thrown` error pushes its
    /// payload, any other error kind is treated as propagating (spec §4.2,
    /// §7).
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Error::Thrown { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            message: e.to_string(),
        }
    }
}
