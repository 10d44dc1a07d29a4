//! Script errors.

use std::path::PathBuf;

use smol_str::SmolStr;
use thiserror::Error;

/// Failures while evaluating a statement or expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// A name was read before any `let` bound it.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(SmolStr),

    /// A call named no script function or builtin.
    #[error("undefined function '{0}'")]
    UndefinedFunction(SmolStr),

    /// Field access on an object that has no such field.
    #[error("object of type {type_name} has no field '{field}'")]
    UndefinedField { type_name: SmolStr, field: SmolStr },

    /// An operator or builtin received a value of the wrong type.
    #[error("type mismatch: {0}")]
    TypeMismatch(SmolStr),

    /// List index outside `0..len`.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// Map lookup with a missing key.
    #[error("key {0} not found")]
    KeyNotFound(String),

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed.
    #[error("integer overflow")]
    Overflow,

    /// Wrong number of call arguments.
    #[error("{name} expects {expected} argument(s), got {got}")]
    InvalidArgumentCount {
        name: SmolStr,
        expected: usize,
        got: usize,
    },

    /// Call nesting exceeded the interpreter limit.
    #[error("call depth limit of {0} exceeded")]
    StackOverflow(usize),
}

/// Script loading or execution errors.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Input that no token matches.
    #[error("line {line}: unexpected character(s) '{text}'")]
    Lex { line: u32, text: SmolStr },

    /// Token stream does not form a valid program.
    #[error("line {line}: {message}")]
    Parse { line: u32, message: SmolStr },

    /// Reading a script file failed.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Evaluation failed; `unit` and `line` locate the innermost statement.
    #[error("{unit}:{line}: {error}")]
    Runtime {
        unit: SmolStr,
        line: u32,
        #[source]
        error: RuntimeError,
    },
}

impl ScriptError {
    pub(crate) fn parse(line: u32, message: impl Into<SmolStr>) -> Self {
        ScriptError::Parse {
            line,
            message: message.into(),
        }
    }
}
