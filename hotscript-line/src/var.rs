#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

pub const MAX_VAR_NAME_LENGTH: usize = 253;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[diagnostic(code(hotscript::name))]
pub enum NameError {
    #[error("blank variable name")]
    Empty,
    #[error("variable name too long: \"{0}\"")]
    TooLong(String),
    #[error("variable name \"{name}\" contains an illegal character '{ch}'")]
    IllegalChar { name: String, ch: char },
    #[error("\"{0}\" is a read-only variable")]
    ReadOnly(String),
}

/// A variable's contents. Scripts see every value as text; numbers are kept
/// unformatted until something asks for their text.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }

    /// Exact length of the text form, in bytes.
    pub fn text_len(&self) -> usize {
        match self {
            Value::Text(s) => s.len(),
            Value::Int(_) | Value::Float(_) => self.to_string().len(),
        }
    }

    pub fn append_to(&self, out: &mut String) {
        use std::fmt::Write;
        match self {
            Value::Text(s) => out.push_str(s),
            other => {
                let _ = write!(out, "{other}");
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:.6}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// Read-only variables whose contents the engine computes on demand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinVar {
    Index,
    LoopField,
    LoopReadLine,
    LoopFileName,
    LoopFileExt,
    LoopFileDir,
    LoopFileFullPath,
    LoopFileSize,
    LoopRegName,
    LoopRegType,
    LoopRegKey,
    LoopRegSubKey,
    ThisLabel,
    ThisHotkey,
    PriorHotkey,
    TickCount,
    Space,
    Tab,
}

const BUILTINS: &[(&str, BuiltinVar)] = &[
    ("a_index", BuiltinVar::Index),
    ("a_loopfield", BuiltinVar::LoopField),
    ("a_loopreadline", BuiltinVar::LoopReadLine),
    ("a_loopfilename", BuiltinVar::LoopFileName),
    ("a_loopfileext", BuiltinVar::LoopFileExt),
    ("a_loopfiledir", BuiltinVar::LoopFileDir),
    ("a_loopfilefullpath", BuiltinVar::LoopFileFullPath),
    ("a_loopfilesize", BuiltinVar::LoopFileSize),
    ("a_loopregname", BuiltinVar::LoopRegName),
    ("a_loopregtype", BuiltinVar::LoopRegType),
    ("a_loopregkey", BuiltinVar::LoopRegKey),
    ("a_loopregsubkey", BuiltinVar::LoopRegSubKey),
    ("a_thislabel", BuiltinVar::ThisLabel),
    ("a_thishotkey", BuiltinVar::ThisHotkey),
    ("a_priorhotkey", BuiltinVar::PriorHotkey),
    ("a_tickcount", BuiltinVar::TickCount),
    ("a_space", BuiltinVar::Space),
    ("a_tab", BuiltinVar::Tab),
];

impl BuiltinVar {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        BUILTINS
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, b)| *b)
    }
}

pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '@' | '$' | '?' | '[' | ']') || !c.is_ascii()
}

pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_VAR_NAME_LENGTH {
        return Err(NameError::TooLong(name.to_string()));
    }
    if let Some(ch) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(NameError::IllegalChar {
            name: name.to_string(),
            ch,
        });
    }
    Ok(())
}

#[derive(Clone, Debug)]
struct Slot {
    name: String,
    value: Value,
    builtin: Option<BuiltinVar>,
}

/// Name → slot store. Lookup is case-insensitive and slots are never removed,
/// so a `VarId` stays valid for the life of the table.
#[derive(Clone, Debug, Default)]
pub struct VarTable {
    slots: Vec<Slot>,
    index: HashMap<String, VarId>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<VarId> {
        self.index.get(&name.to_lowercase()).copied()
    }

    /// Returns the slot for `name`, creating an empty one if it does not exist.
    pub fn resolve(&mut self, name: &str) -> Result<VarId, NameError> {
        if let Some(id) = self.find(name) {
            return Ok(id);
        }
        validate_name(name)?;
        Ok(self.intern(name))
    }

    /// Like [`VarTable::resolve`] for names the caller knows are valid.
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let id = VarId(self.slots.len() as u32);
        self.slots.push(Slot {
            name: name.to_string(),
            value: Value::default(),
            builtin: BuiltinVar::from_name(name),
        });
        self.index.insert(name.to_lowercase(), id);
        id
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.slots[id.index()].name
    }

    pub fn builtin(&self, id: VarId) -> Option<BuiltinVar> {
        self.slots[id.index()].builtin
    }

    /// Stored contents. Built-ins always read as empty here; the engine
    /// supplies their values.
    pub fn get(&self, id: VarId) -> &Value {
        &self.slots[id.index()].value
    }

    pub fn set(&mut self, id: VarId, value: impl Into<Value>) -> Result<(), NameError> {
        let slot = &mut self.slots[id.index()];
        if slot.builtin.is_some() {
            return Err(NameError::ReadOnly(slot.name.clone()));
        }
        slot.value = value.into();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &str, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.builtin.is_none())
            .map(|(i, s)| (VarId(i as u32), s.name.as_str(), &s.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut vars = VarTable::new();
        let a = vars.resolve("Count").unwrap();
        let b = vars.resolve("COUNT").unwrap();
        assert_eq!(a, b);
        assert_eq!(vars.name(a), "Count");
    }

    #[test]
    fn builtins_are_read_only() {
        let mut vars = VarTable::new();
        let id = vars.resolve("a_index").unwrap();
        assert_eq!(vars.builtin(id), Some(BuiltinVar::Index));
        assert!(matches!(vars.set(id, 3), Err(NameError::ReadOnly(_))));
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert!(matches!(
            validate_name("a b"),
            Err(NameError::IllegalChar { ch: ' ', .. })
        ));
        assert!(matches!(
            validate_name(&"x".repeat(MAX_VAR_NAME_LENGTH + 1)),
            Err(NameError::TooLong(_))
        ));
        assert!(validate_name("Arr[3]_#").is_ok());
    }

    #[test]
    fn numbers_render_like_script_text() {
        assert_eq!(Value::Int(-12).to_string(), "-12");
        assert_eq!(Value::Float(1.5).to_string(), "1.500000");
        assert_eq!(Value::Float(2.0).text_len(), "2.000000".len());
    }
}
