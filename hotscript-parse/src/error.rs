#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

/// A problem found while building or structuring the program. Loading stops
/// at the first one; nothing of a script that fails to load ever runs.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("{file}:{line}: {message}")]
#[diagnostic(code(hotscript::load))]
pub struct LoadError {
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl LoadError {
    pub fn new(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            line,
        }
    }
}
