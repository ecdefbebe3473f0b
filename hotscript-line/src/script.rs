#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::action::Action;
use crate::command::CommandSet;
use crate::line::{Line, LineId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub target: LineId,
}

/// Labels in load order, looked up case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    labels: Vec<Label>,
    by_name: HashMap<String, LabelId>,
}

impl LabelTable {
    pub fn find(&self, name: &str) -> Option<LabelId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn get(&self, id: LabelId) -> &Label {
        &self.labels[id.0 as usize]
    }

    /// Returns `None` when the name is already taken.
    pub fn insert(&mut self, name: &str, target: LineId) -> Option<LabelId> {
        let key = name.to_lowercase();
        if self.by_name.contains_key(&key) {
            return None;
        }
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(Label {
            name: name.to_string(),
            target,
        });
        self.by_name.insert(key, id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &Label)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (LabelId(i as u32), l))
    }
}

/// A loaded program: the line arena plus everything needed to run it except
/// variable state.
#[derive(Clone, Debug, Default)]
pub struct Script {
    pub lines: Vec<Line>,
    pub labels: LabelTable,
    pub files: Vec<String>,
    pub commands: CommandSet,
}

impl Script {
    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.index()]
    }

    pub fn first_line(&self) -> Option<LineId> {
        (!self.lines.is_empty()).then_some(LineId(0))
    }

    pub fn is_if_family(&self, id: LineId) -> bool {
        match self.line(id).action {
            Action::If(_) => true,
            Action::Command(cmd) => self.commands.get(cmd).conditional,
            _ => false,
        }
    }

    /// The else paired with an if-family line, if any.
    pub fn else_of(&self, id: LineId) -> Option<LineId> {
        let related = self.line(id).related?;
        (self.line(related).action == Action::Else).then_some(related)
    }

    /// A jump from `from` to `target` is valid when the target's enclosing
    /// block is the jumping line's own block or one of its ancestors.
    pub fn is_jump_valid(&self, from: LineId, target: LineId) -> bool {
        let wanted = self.line(target).parent;
        let mut level = self.line(from).parent;
        loop {
            if level == wanted {
                return true;
            }
            match level {
                Some(id) => level = self.line(id).parent,
                None => return false,
            }
        }
    }

    /// Labels whose routine begins with `Suspend` (other than `Suspend, On`)
    /// still run while hotkeys are suspended.
    pub fn is_exempt_from_suspend(&self, label: LabelId) -> bool {
        let line = self.line(self.labels.get(label).target);
        line.action == Action::Suspend && !line.arg_text(0).eq_ignore_ascii_case("on")
    }

    pub fn describe(&self, id: LineId) -> String {
        let line = self.line(id);
        let file = self
            .files
            .get(line.at.file.0 as usize)
            .map_or("<script>", String::as_str);
        format!("{file}:{}", line.at.line)
    }
}
