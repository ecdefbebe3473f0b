#![forbid(unsafe_code)]

//! Pre-tokenized program files.
//!
//! ```json
//! {
//!   "name": "demo.hks",
//!   "items": [
//!     { "cmd": "Loop", "args": ["3"] },
//!     { "cmd": "Echo", "args": ["pass %A_Index%"] },
//!     { "cmd": "return" },
//!     { "label": "greet" },
//!     { "cmd": "IfExist", "args": ["notes.txt"], "then": { "cmd": "Echo", "args": ["found"] } }
//!   ]
//! }
//! ```
//!
//! Args use backtick escapes (`` `% `` for a literal percent sign). A missing
//! `line` is filled in from the item's position.

use std::fs;
use std::path::{Path, PathBuf};

use hotscript_parse::{Item, RawArg, Statement};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ProgramError {
    #[error("cannot read program {path}: {source}")]
    #[diagnostic(code(hotscript::program::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid program file {path}: {source}")]
    #[diagnostic(
        code(hotscript::program::json),
        help("items are {{\"label\": name}} or {{\"cmd\": keyword, \"args\": [..]}}")
    )]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ItemDef {
    Label {
        label: String,
        #[serde(default)]
        line: u32,
    },
    Statement(StatementDef),
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatementDef {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub line: u32,
    /// Action written on the same line, after an if or else.
    #[serde(default)]
    pub then: Option<Box<StatementDef>>,
}

impl StatementDef {
    fn into_statement(self, fallback_line: u32) -> Statement {
        let line = if self.line == 0 { fallback_line } else { self.line };
        let mut stmt = Statement::new(self.cmd, line);
        stmt.args = self.args.iter().map(|a| RawArg::from_escaped(a)).collect();
        if let Some(then) = self.then {
            stmt = stmt.then(then.into_statement(line));
        }
        stmt
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProgramFile {
    #[serde(default)]
    pub name: Option<String>,
    pub items: Vec<ItemDef>,
}

impl ProgramFile {
    pub fn from_json(path: &Path, src: &str) -> Result<Self, ProgramError> {
        serde_json::from_str(src).map_err(|source| ProgramError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ProgramError> {
        let src = fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &src)
    }

    /// The name errors are reported under: the declared one, else the file name.
    pub fn display_name(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
        })
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, def)| {
                let position = i as u32 + 1;
                match def {
                    ItemDef::Label { label, line } => Item::Label {
                        name: label,
                        line_no: if line == 0 { position } else { line },
                    },
                    ItemDef::Statement(stmt) => Item::Statement(stmt.into_statement(position)),
                }
            })
            .collect()
    }
}
