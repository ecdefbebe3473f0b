#![forbid(unsafe_code)]

//! Turns tokenized statements into a structured, validated [`Program`].

pub mod builder;
pub mod error;
pub mod preparse;
pub mod statement;

pub use builder::Builder;
pub use error::LoadError;
pub use statement::{RawArg, Statement};

use hotscript_line::{CommandSet, Program};

/// One entry of a tokenized source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Label { name: String, line_no: u32 },
    Statement(Statement),
}

impl From<Statement> for Item {
    fn from(stmt: Statement) -> Self {
        Item::Statement(stmt)
    }
}

/// Loads a single-file program.
pub fn load(
    file: &str,
    items: impl IntoIterator<Item = Item>,
    commands: CommandSet,
) -> Result<Program, LoadError> {
    let mut builder = Builder::new(commands);
    builder.begin_file(file);
    for item in items {
        match item {
            Item::Label { name, line_no } => builder.add_label(&name, line_no)?,
            Item::Statement(stmt) => builder.add_statement(stmt)?,
        }
    }
    builder.finish()
}

/// Shorthand for building item lists in tests and front ends.
pub fn label(name: &str, line_no: u32) -> Item {
    Item::Label {
        name: name.to_string(),
        line_no,
    }
}
