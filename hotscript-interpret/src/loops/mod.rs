#![forbid(unsafe_code)]

//! Iteration state for the five loop kinds. The engine owns the driver (see
//! `exec.rs`); this module only knows how to produce the next item.

pub mod file;
pub mod parse;
pub mod read_file;
pub mod registry;

use hotscript_line::{LoopKind, RegRoot};

use crate::coerce::{parse_number, Number};
use crate::error::ErrorKind;

pub use file::{FileCursor, FileItem, FileMode};
pub use parse::ParseCursor;
pub use read_file::{LoopOutput, ReadCursor};
pub use registry::{MemoryRegistry, RegCursor, RegItem, RegMode, RegValue, Registry};

/// What the current iteration exposes through the `A_Loop*` variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoopItem {
    #[default]
    None,
    Field(String),
    Line(String),
    File(FileItem),
    Reg(RegItem),
}

#[derive(Debug)]
enum Cursor {
    Count { remaining: Option<i64> },
    File(FileCursor),
    Registry(RegCursor),
    Parse(ParseCursor),
    Read {
        cursor: ReadCursor,
        output: Option<LoopOutput>,
    },
}

/// One running loop on a thread's loop stack.
#[derive(Debug)]
pub struct LoopContext {
    pub kind: LoopKind,
    /// `A_Index`: 1 during the first iteration, 0 before it.
    pub index: i64,
    pub current: LoopItem,
    cursor: Cursor,
}

fn flag(arg: &str) -> bool {
    arg.trim() == "1"
}

/// Decides the kind of a loop whose first arg was only known at run time.
pub fn classify(first: &str) -> LoopKind {
    let t = first.trim();
    if t.is_empty() || matches!(parse_number(t), Some(Number::Int(_))) {
        LoopKind::Count
    } else if RegRoot::from_name(t).is_some() {
        LoopKind::Registry
    } else {
        LoopKind::File
    }
}

impl LoopContext {
    /// `args` are the loop line's expanded args, keyword included (`Parse`,
    /// `Read`). For a parse loop the second arg is the input's contents.
    pub fn start(kind: LoopKind, args: &[&str]) -> Result<Self, ErrorKind> {
        let arg = |i: usize| args.get(i).copied().unwrap_or("");
        let kind = match kind {
            LoopKind::Unknown => classify(arg(0)),
            known => known,
        };
        let cursor = match kind {
            LoopKind::Count | LoopKind::Unknown => {
                let remaining = match arg(0).trim() {
                    "" => None,
                    t => Some(parse_number(t).map_or(0, Number::as_i64)),
                };
                Cursor::Count { remaining }
            }
            LoopKind::File => Cursor::File(FileCursor::new(
                arg(0),
                FileMode::from_arg(arg(1))?,
                flag(arg(2)),
            )?),
            LoopKind::Registry => {
                let root = RegRoot::from_name(arg(0)).ok_or_else(|| {
                    ErrorKind::BadParameter(format!("invalid registry root \"{}\"", arg(0)))
                })?;
                Cursor::Registry(RegCursor::new(
                    root,
                    arg(1),
                    RegMode::from_arg(arg(2))?,
                    flag(arg(3)),
                ))
            }
            LoopKind::Parse => Cursor::Parse(ParseCursor::new(arg(1), arg(2), arg(3))),
            LoopKind::ReadFile => Cursor::Read {
                cursor: ReadCursor::open(arg(1)),
                output: (!arg(2).trim().is_empty()).then(|| LoopOutput::new(arg(2).trim())),
            },
        };
        tracing::trace!(?kind, "loop started");
        Ok(Self {
            kind,
            index: 0,
            current: LoopItem::None,
            cursor,
        })
    }

    /// Moves to the next iteration. `Ok(false)` when the loop is done; an
    /// error ends the loop and the thread running it.
    pub fn advance(&mut self, registry: &dyn Registry) -> Result<bool, ErrorKind> {
        let item = match &mut self.cursor {
            Cursor::Count { remaining } => match remaining {
                None => Some(LoopItem::None),
                Some(n) if self.index < *n => Some(LoopItem::None),
                Some(_) => None,
            },
            Cursor::File(c) => c.next_item()?.map(LoopItem::File),
            Cursor::Registry(c) => c.next_item(registry).map(LoopItem::Reg),
            Cursor::Parse(c) => c.next_field().map(LoopItem::Field),
            Cursor::Read { cursor, .. } => cursor.next_line()?.map(LoopItem::Line),
        };
        let Some(item) = item else {
            return Ok(false);
        };
        self.index += 1;
        self.current = item;
        Ok(true)
    }

    /// Output file of a read loop, if it named one.
    pub fn output(&mut self) -> Option<&mut LoopOutput> {
        match &mut self.cursor {
            Cursor::Read { output, .. } => output.as_mut(),
            _ => None,
        }
    }
}
