#![forbid(unsafe_code)]

//! Structuring passes run once over the finished line sequence.
//!
//! Pass 1 pairs `{`/`}` and gives every line its enclosing block as parent.
//! Pass 2 walks statements, pairs each if with its else, links ifs, elses and
//! loops to the line after their bodies, and re-parents brace-less bodies to
//! the line that controls them. Literal jump targets are resolved last, once
//! every parent link is final.

use hotscript_line::{Action, Attribute, LineId, Script};

use crate::error::LoadError;

pub fn run(script: &mut Script, implicit_exit: LineId) -> Result<(), LoadError> {
    match_blocks(script)?;
    Structurer {
        script: &mut *script,
        implicit_exit,
    }
    .run()?;
    resolve_labels(script)
}

fn error(script: &Script, id: LineId, message: impl Into<String>) -> LoadError {
    let line = script.line(id);
    let file = script
        .files
        .get(line.at.file.0 as usize)
        .map_or("<script>", String::as_str);
    LoadError::new(file, line.at.line, message)
}

fn match_blocks(script: &mut Script) -> Result<(), LoadError> {
    let mut open: Vec<LineId> = Vec::new();
    for i in 0..script.lines.len() {
        let id = LineId(i as u32);
        script.lines[i].parent = open.last().copied();
        match script.lines[i].action {
            Action::BlockBegin => open.push(id),
            Action::BlockEnd => {
                let Some(begin) = open.pop() else {
                    return Err(error(script, id, "missing \"{\""));
                };
                script.lines[i].related = Some(begin);
                script.lines[begin.index()].related = Some(id);
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(begin) => Err(error(script, begin, "missing \"}\"")),
        None => Ok(()),
    }
}

struct Structurer<'a> {
    script: &'a mut Script,
    implicit_exit: LineId,
}

impl Structurer<'_> {
    fn run(&mut self) -> Result<(), LoadError> {
        let mut cur = self.script.first_line();
        while let Some(id) = cur {
            cur = self.statement(id, false)?;
        }
        Ok(())
    }

    /// Structures the statement starting at `id`; returns the line after it.
    fn statement(&mut self, id: LineId, in_loop: bool) -> Result<Option<LineId>, LoadError> {
        let line = self.script.line(id);
        let next = line.next;
        match line.action {
            _ if self.script.is_if_family(id) => {
                let after = self.body(id, in_loop)?;
                match after {
                    Some(else_id) if self.script.line(else_id).action == Action::Else => {
                        let end = self.body(else_id, in_loop)?;
                        self.script.lines[id.index()].related = Some(else_id);
                        self.script.lines[else_id.index()].related = end;
                        Ok(end)
                    }
                    _ => {
                        self.script.lines[id.index()].related = after;
                        Ok(after)
                    }
                }
            }
            Action::Else => Err(error(self.script, id, "ELSE with no matching IF")),
            Action::Loop => {
                let end = self.body(id, true)?;
                self.script.lines[id.index()].related = end;
                Ok(end)
            }
            Action::BlockBegin => {
                let Some(block_end) = line.related else {
                    return Err(error(self.script, id, "missing \"}\""));
                };
                let mut cur = next;
                while let Some(inner) = cur {
                    if inner == block_end {
                        break;
                    }
                    cur = self.statement(inner, in_loop)?;
                }
                Ok(self.script.line(block_end).next)
            }
            Action::BlockEnd => Err(error(self.script, id, "unexpected \"}\"")),
            Action::Break | Action::Continue if !in_loop => Err(error(
                self.script,
                id,
                format!("{} must be enclosed by a Loop", line.action.name()),
            )),
            _ => Ok(next),
        }
    }

    /// Structures the one-statement body controlled by `owner`.
    fn body(&mut self, owner: LineId, in_loop: bool) -> Result<Option<LineId>, LoadError> {
        let body = self
            .script
            .line(owner)
            .next
            .filter(|&b| b != self.implicit_exit)
            .filter(|&b| !matches!(self.script.line(b).action, Action::BlockEnd | Action::Else));
        let Some(body) = body else {
            let name = match self.script.line(owner).action {
                Action::Else => "ELSE",
                Action::Loop => "LOOP",
                _ => "IF",
            };
            return Err(error(
                self.script,
                owner,
                format!("{name} has no action below it"),
            ));
        };
        self.script.lines[body.index()].parent = Some(owner);
        self.statement(body, in_loop)
    }
}

fn resolve_labels(script: &mut Script) -> Result<(), LoadError> {
    for i in 0..script.lines.len() {
        let id = LineId(i as u32);
        let line = script.line(id);
        if !line.action.takes_label() {
            continue;
        }
        let Some(arg) = line.args.first() else {
            continue;
        };
        if !arg.is_literal() || arg.text.trim().is_empty() {
            continue;
        }
        let name = arg.text.trim();
        let Some(label) = script.labels.find(name) else {
            return Err(error(script, id, format!("target label \"{name}\" does not exist")));
        };
        let target = script.labels.get(label).target;
        if matches!(line.action, Action::Goto | Action::Gosub) && !script.is_jump_valid(id, target) {
            return Err(error(
                script,
                id,
                format!("a {} cannot jump into a block or loop (\"{name}\")", line.action.name()),
            ));
        }
        script.lines[i].attribute = Attribute::Label(label);
    }
    Ok(())
}
