#![forbid(unsafe_code)]

use hotscript_line::{LineId, NameError};
use miette::Diagnostic;
use thiserror::Error;

/// What went wrong while running a line.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("This line would attempt to divide by zero.")]
    DivideByZero,
    #[error("out of memory: expanding this line needs {needed} bytes (limit {limit})")]
    OutOfMemory { needed: usize, limit: usize },
    #[error("target label \"{0}\" does not exist")]
    UnknownLabel(String),
    #[error("a Goto/Gosub cannot jump into a block or loop (\"{0}\")")]
    InvalidJump(String),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("call to nonexistent function \"{0}\"")]
    UnknownFunction(String),
    #[error("expression error: {0}")]
    Expression(String),
    #[error("{0}")]
    BadParameter(String),
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },
    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("i/o error: {0}")]
    Io(String),
}

/// A runtime error, tied to the line that raised it. It ends the current
/// thread only.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("{at}: {kind} The current thread will exit.")]
#[diagnostic(code(hotscript::runtime))]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub at: String,
    pub line: LineId,
}
