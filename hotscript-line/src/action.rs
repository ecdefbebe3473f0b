#![forbid(unsafe_code)]

use crate::command::CommandId;
use crate::script::LabelId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `var = text`
    Text,
    /// `var := expression`
    Expr,
    Add,
    Sub,
    Mult,
    Div,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// Condition of an if-family line. The command notation (`IfEqual, x, 1`)
/// and the operator notation (`if x = 1`) both land on `Compare`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IfCond {
    Expr,
    Compare(CompareOp),
    Between { negate: bool },
    In { negate: bool },
    Contains { negate: bool },
    Is { negate: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Assign(AssignOp),
    If(IfCond),
    Else,
    BlockBegin,
    BlockEnd,
    Loop,
    Break,
    Continue,
    Goto,
    Gosub,
    Return,
    Exit,
    ExitApp,
    Sleep,
    SetTimer,
    OnExit,
    Suspend,
    Thread,
    /// A leaf command supplied by the command layer.
    Command(CommandId),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Assign(AssignOp::Text) => "=",
            Action::Assign(AssignOp::Expr) => ":=",
            Action::Assign(AssignOp::Add) => "+=",
            Action::Assign(AssignOp::Sub) => "-=",
            Action::Assign(AssignOp::Mult) => "*=",
            Action::Assign(AssignOp::Div) => "/=",
            Action::If(_) => "If",
            Action::Else => "Else",
            Action::BlockBegin => "{",
            Action::BlockEnd => "}",
            Action::Loop => "Loop",
            Action::Break => "Break",
            Action::Continue => "Continue",
            Action::Goto => "Goto",
            Action::Gosub => "Gosub",
            Action::Return => "Return",
            Action::Exit => "Exit",
            Action::ExitApp => "ExitApp",
            Action::Sleep => "Sleep",
            Action::SetTimer => "SetTimer",
            Action::OnExit => "OnExit",
            Action::Suspend => "Suspend",
            Action::Thread => "Thread",
            Action::Command(_) => "command",
        }
    }

    /// Lines that accept a label name as first arg.
    pub fn takes_label(&self) -> bool {
        matches!(
            self,
            Action::Goto | Action::Gosub | Action::SetTimer | Action::OnExit
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopKind {
    /// First arg has derefs; decided when the loop starts.
    Unknown,
    Count,
    File,
    Registry,
    Parse,
    ReadFile,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Attribute {
    #[default]
    None,
    Loop(LoopKind),
    /// Literal label target, resolved at load.
    Label(LabelId),
}

/// Registry root key named by a registry loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegRoot {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
    CurrentConfig,
}

impl RegRoot {
    pub fn from_name(name: &str) -> Option<Self> {
        let root = match name.trim().to_ascii_uppercase().as_str() {
            "HKEY_LOCAL_MACHINE" | "HKLM" => RegRoot::LocalMachine,
            "HKEY_CURRENT_USER" | "HKCU" => RegRoot::CurrentUser,
            "HKEY_CLASSES_ROOT" | "HKCR" => RegRoot::ClassesRoot,
            "HKEY_USERS" | "HKU" => RegRoot::Users,
            "HKEY_CURRENT_CONFIG" | "HKCC" => RegRoot::CurrentConfig,
            _ => return None,
        };
        Some(root)
    }

    pub fn name(self) -> &'static str {
        match self {
            RegRoot::LocalMachine => "HKEY_LOCAL_MACHINE",
            RegRoot::CurrentUser => "HKEY_CURRENT_USER",
            RegRoot::ClassesRoot => "HKEY_CLASSES_ROOT",
            RegRoot::Users => "HKEY_USERS",
            RegRoot::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }
}
