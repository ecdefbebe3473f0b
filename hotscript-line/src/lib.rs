#![forbid(unsafe_code)]

//! Program model shared by the loader and the engine: the line arena, action
//! tags, leaf command table, labels and the variable store.

pub mod action;
pub mod command;
pub mod lex;
pub mod line;
pub mod script;
pub mod var;

pub use action::{Action, AssignOp, Attribute, CompareOp, IfCond, LoopKind, RegRoot};
pub use command::{ArgKind, CommandId, CommandSet, CommandSpec};
pub use line::{Arg, Deref, DerefTarget, FileId, Line, LineId, NamePart, Provenance};
pub use script::{Label, LabelId, LabelTable, Script};
pub use var::{
    validate_name, BuiltinVar, NameError, Value, VarId, VarTable, MAX_VAR_NAME_LENGTH,
};

pub const MAX_ARGS: usize = 20;
pub const MAX_DEREFS_PER_ARG: usize = 512;

/// A freshly loaded program and the variables its lines refer to.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub script: Script,
    pub vars: VarTable,
}
