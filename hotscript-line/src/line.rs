#![forbid(unsafe_code)]

use crate::action::{Action, Attribute};
use crate::command::ArgKind;
use crate::var::VarId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u32);

impl LineId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FileId(pub u16);

/// Where a line came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Provenance {
    pub file: FileId,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamePart {
    Literal(String),
    Var(VarId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DerefTarget {
    Static(VarId),
    /// Name assembled at run time from literal text and variable contents,
    /// e.g. `Item%i%`.
    Dynamic(Vec<NamePart>),
}

/// A variable reference located in an arg's text. For text args the span
/// covers the `%name%` including both percent signs; for expression args it
/// covers the operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deref {
    pub start: usize,
    pub len: usize,
    pub target: DerefTarget,
}

impl Deref {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arg {
    pub kind: ArgKind,
    /// Text with escapes already removed.
    pub text: String,
    pub is_expression: bool,
    pub derefs: Vec<Deref>,
}

impl Arg {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Text,
            text: text.into(),
            is_expression: false,
            derefs: Vec::new(),
        }
    }

    /// No derefs and no expression: the text is the value.
    pub fn is_literal(&self) -> bool {
        !self.is_expression && self.derefs.is_empty()
    }

    /// Target of a var-kind arg. `None` when the arg is blank.
    pub fn var(&self) -> Option<&DerefTarget> {
        match self.kind {
            ArgKind::Text => None,
            ArgKind::InputVar | ArgKind::OutputVar => self.derefs.first().map(|d| &d.target),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Line {
    pub action: Action,
    pub at: Provenance,
    pub args: Vec<Arg>,
    pub attribute: Attribute,
    pub prev: Option<LineId>,
    pub next: Option<LineId>,
    pub related: Option<LineId>,
    pub parent: Option<LineId>,
}

impl Line {
    pub fn new(action: Action, at: Provenance, args: Vec<Arg>) -> Self {
        Self {
            action,
            at,
            args,
            attribute: Attribute::None,
            prev: None,
            next: None,
            related: None,
            parent: None,
        }
    }

    pub fn arg_text(&self, pos: usize) -> &str {
        self.args.get(pos).map_or("", |a| a.text.as_str())
    }
}
