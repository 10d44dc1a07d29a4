//! `lantern-script` - a small scripting language that hosts the lantern
//! debugger.
//!
//! Scripts are parsed into an [`ast::Script`] and run by an [`Interpreter`],
//! which reports `Call`/`Line`/`Return` events to an attached trace hook.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

/// Syntax tree.
pub mod ast;
/// Script errors.
pub mod error;
/// Interpreter and frames.
pub mod interp;
/// Tokenizer.
pub mod lexer;
/// Parser.
pub mod parse;

pub use error::{RuntimeError, ScriptError};
pub use interp::{Interpreter, DEFAULT_MAX_DEPTH, PRELUDE_UNIT};
pub use parse::{parse, parse_file};
