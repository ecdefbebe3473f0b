#![forbid(unsafe_code)]

use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommandId(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ArgKind {
    #[default]
    Text,
    InputVar,
    OutputVar,
}

/// How a leaf command takes its arguments. The builder uses this to place
/// derefs and check arg counts; the engine uses `conditional` and `waits`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub min_args: usize,
    pub max_args: usize,
    pub arg_kinds: Vec<ArgKind>,
    /// Result is True/False and selects the following line like an if.
    pub conditional: bool,
    /// Blocks for a while; the engine polls triggers before running it.
    pub waits: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            arg_kinds: Vec::new(),
            conditional: false,
            waits: false,
        }
    }

    pub fn args(mut self, kinds: impl IntoIterator<Item = ArgKind>) -> Self {
        self.arg_kinds = kinds.into_iter().collect();
        self
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    pub fn waits(mut self) -> Self {
        self.waits = true;
        self
    }

    pub fn arg_kind(&self, pos: usize) -> ArgKind {
        self.arg_kinds.get(pos).copied().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandSet {
    specs: Vec<CommandSpec>,
    by_name: HashMap<String, CommandId>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `spec`; a later spec with the same name replaces the earlier one.
    pub fn add(&mut self, spec: CommandSpec) -> CommandId {
        let key = spec.name.to_ascii_lowercase();
        if let Some(&id) = self.by_name.get(&key) {
            self.specs[id.0 as usize] = spec;
            return id;
        }
        let id = CommandId(self.specs.len() as u16);
        self.specs.push(spec);
        self.by_name.insert(key, id);
        id
    }

    pub fn with(mut self, spec: CommandSpec) -> Self {
        self.add(spec);
        self
    }

    pub fn find(&self, name: &str) -> Option<CommandId> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn get(&self, id: CommandId) -> &CommandSpec {
        &self.specs[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommandId, &CommandSpec)> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, s)| (CommandId(i as u16), s))
    }
}
