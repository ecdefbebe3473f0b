#![forbid(unsafe_code)]

//! Argument expansion. Every arg of a line is expanded into the shared
//! scratch buffer in one go: the total size is worked out first, the buffer
//! grows at most once, and then the text is written.

use std::ops::Range;
use std::time::Instant;

use hotscript_line::{
    ArgKind, BuiltinVar, DerefTarget, Line, NamePart, Value, VarId, VarTable, validate_name,
};

use crate::error::ErrorKind;
use crate::expr;
use crate::loops::LoopItem;
use crate::scratch::ScratchBuf;
use crate::thread::ThreadContext;

/// Read-side view of everything built-in variables are computed from.
pub(crate) struct BuiltinView<'a> {
    pub thread: Option<&'a ThreadContext>,
    pub prior_hotkey: &'a str,
    pub epoch: Instant,
}

impl BuiltinView<'_> {
    fn innermost<T>(&self, pick: impl Fn(&LoopItem) -> Option<T>) -> Option<T> {
        self.thread?.loops.iter().rev().find_map(|l| pick(&l.current))
    }

    pub fn value(&self, var: BuiltinVar) -> Value {
        let file = |f: fn(&crate::loops::FileItem) -> Value| {
            self.innermost(|item| match item {
                LoopItem::File(fi) => Some(f(fi)),
                _ => None,
            })
            .unwrap_or_default()
        };
        let reg = |f: fn(&crate::loops::RegItem) -> Value| {
            self.innermost(|item| match item {
                LoopItem::Reg(ri) => Some(f(ri)),
                _ => None,
            })
            .unwrap_or_default()
        };
        match var {
            BuiltinVar::Index => Value::Int(
                self.thread
                    .and_then(|t| t.loops.last())
                    .map_or(0, |l| l.index),
            ),
            BuiltinVar::LoopField => self
                .innermost(|item| match item {
                    LoopItem::Field(s) => Some(Value::from(s.as_str())),
                    _ => None,
                })
                .unwrap_or_default(),
            BuiltinVar::LoopReadLine => self
                .innermost(|item| match item {
                    LoopItem::Line(s) => Some(Value::from(s.as_str())),
                    _ => None,
                })
                .unwrap_or_default(),
            BuiltinVar::LoopFileName => file(|f| Value::from(f.name.as_str())),
            BuiltinVar::LoopFileExt => file(|f| Value::from(f.ext())),
            BuiltinVar::LoopFileDir => file(|f| Value::from(f.dir.as_str())),
            BuiltinVar::LoopFileFullPath => file(|f| Value::from(f.full_path.as_str())),
            BuiltinVar::LoopFileSize => file(|f| Value::Int(f.size as i64)),
            BuiltinVar::LoopRegName => reg(|r| Value::from(r.name.as_str())),
            BuiltinVar::LoopRegType => reg(|r| Value::from(r.kind.as_str())),
            BuiltinVar::LoopRegKey => reg(|r| Value::from(r.root.name())),
            BuiltinVar::LoopRegSubKey => reg(|r| Value::from(r.subkey.as_str())),
            BuiltinVar::ThisLabel => {
                Value::from(self.thread.map_or("", |t| t.label_name.as_str()))
            }
            BuiltinVar::ThisHotkey => Value::from(self.thread.map_or("", |t| t.name.as_str())),
            BuiltinVar::PriorHotkey => Value::from(self.prior_hotkey),
            BuiltinVar::TickCount => Value::Int(self.epoch.elapsed().as_millis() as i64),
            BuiltinVar::Space => Value::from(" "),
            BuiltinVar::Tab => Value::from("\t"),
        }
    }
}

/// Variable access during expansion and expression evaluation.
pub(crate) struct Env<'a> {
    pub vars: &'a mut VarTable,
    pub view: &'a BuiltinView<'a>,
}

impl Env<'_> {
    fn dynamic_name(&self, parts: &[NamePart]) -> Result<String, ErrorKind> {
        let mut name = String::new();
        for part in parts {
            match part {
                NamePart::Literal(s) => name.push_str(s),
                NamePart::Var(id) => self.read(*id).append_to(&mut name),
            }
        }
        validate_name(&name)?;
        Ok(name)
    }

    fn read(&self, id: VarId) -> Value {
        match self.vars.builtin(id) {
            Some(b) => self.view.value(b),
            None => self.vars.get(id).clone(),
        }
    }

    /// Current contents of the variable a deref names. A dynamic name that
    /// does not exist yet reads as empty without being created.
    pub fn operand(&mut self, target: &DerefTarget) -> Result<Value, ErrorKind> {
        match target {
            DerefTarget::Static(id) => Ok(self.read(*id)),
            DerefTarget::Dynamic(parts) => {
                let name = self.dynamic_name(parts)?;
                if let Some(b) = BuiltinVar::from_name(&name) {
                    return Ok(self.view.value(b));
                }
                Ok(self.vars.find(&name).map(|id| self.read(id)).unwrap_or_default())
            }
        }
    }

    /// The slot a deref names, creating it when the name is dynamic and new.
    pub fn resolve(&mut self, target: &DerefTarget) -> Result<VarId, ErrorKind> {
        match target {
            DerefTarget::Static(id) => Ok(*id),
            DerefTarget::Dynamic(parts) => {
                let name = self.dynamic_name(parts)?;
                Ok(self.vars.resolve(&name)?)
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Expanded {
    Text(Range<usize>),
    Expr { text: Range<usize>, value: Value },
    Input { var: VarId, text: Range<usize> },
    Output(Option<VarId>),
}

/// A line's expanded args. Text lives in the scratch buffer and stays valid
/// until the mark taken before expansion is released.
#[derive(Clone, Debug, Default)]
pub struct ExpandedArgs {
    args: Vec<Expanded>,
}

impl ExpandedArgs {
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn text<'s>(&self, i: usize, scratch: &'s ScratchBuf) -> &'s str {
        match self.args.get(i) {
            Some(Expanded::Text(r) | Expanded::Expr { text: r, .. } | Expanded::Input { text: r, .. }) => {
                scratch.get(r.clone())
            }
            Some(Expanded::Output(_)) | None => "",
        }
    }

    pub fn output(&self, i: usize) -> Option<VarId> {
        match self.args.get(i) {
            Some(Expanded::Output(id)) => *id,
            _ => None,
        }
    }

    pub fn input(&self, i: usize) -> Option<VarId> {
        match self.args.get(i) {
            Some(Expanded::Input { var, .. }) => Some(*var),
            _ => None,
        }
    }

    /// Result of an expression arg, before it was turned into text.
    pub fn value(&self, i: usize) -> Option<&Value> {
        match self.args.get(i) {
            Some(Expanded::Expr { value, .. }) => Some(value),
            _ => None,
        }
    }
}

enum Planned {
    Text(Vec<Value>),
    Expr(Value),
    Input(VarId, Value),
    Output(Option<VarId>),
}

pub(crate) fn expand_args(
    line: &Line,
    scratch: &mut ScratchBuf,
    vars: &mut VarTable,
    view: &BuiltinView<'_>,
) -> Result<ExpandedArgs, ErrorKind> {
    let mut env = Env { vars, view };

    // Pass 1: resolve every value and add up the space they need.
    let mut planned = Vec::with_capacity(line.args.len());
    let mut needed = 0usize;
    for arg in &line.args {
        let plan = match arg.kind {
            ArgKind::OutputVar => Planned::Output(match arg.var() {
                Some(target) => Some(env.resolve(target)?),
                None => None,
            }),
            ArgKind::InputVar => match arg.var() {
                Some(target) => {
                    let id = env.resolve(target)?;
                    let value = env.operand(&DerefTarget::Static(id))?;
                    needed += value.text_len();
                    Planned::Input(id, value)
                }
                None => Planned::Text(Vec::new()),
            },
            ArgKind::Text if arg.is_expression => {
                let value = expr::evaluate(&arg.text, &arg.derefs, &mut env)?;
                needed += value.text_len();
                Planned::Expr(value)
            }
            ArgKind::Text => {
                let mut values = Vec::with_capacity(arg.derefs.len());
                needed += arg.text.len();
                for deref in &arg.derefs {
                    let value = env.operand(&deref.target)?;
                    needed = (needed + value.text_len()).saturating_sub(deref.len);
                    values.push(value);
                }
                Planned::Text(values)
            }
        };
        planned.push(plan);
    }

    scratch.reserve(needed)?;

    // Pass 2: write.
    let mut args = Vec::with_capacity(planned.len());
    for (arg, plan) in line.args.iter().zip(planned) {
        let out = scratch.buf_mut();
        let start = out.len();
        let expanded = match plan {
            Planned::Output(id) => Expanded::Output(id),
            Planned::Input(var, value) => {
                value.append_to(out);
                Expanded::Input {
                    var,
                    text: start..out.len(),
                }
            }
            Planned::Expr(value) => {
                value.append_to(out);
                Expanded::Expr {
                    text: start..out.len(),
                    value,
                }
            }
            Planned::Text(values) => {
                let mut at = 0;
                for (deref, value) in arg.derefs.iter().zip(&values) {
                    out.push_str(&arg.text[at..deref.start]);
                    value.append_to(out);
                    at = deref.end();
                }
                out.push_str(&arg.text[at..]);
                Expanded::Text(start..out.len())
            }
        };
        args.push(expanded);
    }
    Ok(ExpandedArgs { args })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotscript_line::{Action, Arg, AssignOp, Deref, Provenance};

    fn view() -> BuiltinView<'static> {
        BuiltinView {
            thread: None,
            prior_hotkey: "",
            epoch: Instant::now(),
        }
    }

    fn text_arg(text: &str, derefs: Vec<Deref>) -> Arg {
        Arg {
            derefs,
            ..Arg::text(text)
        }
    }

    #[test]
    fn text_derefs_are_substituted() {
        let mut vars = VarTable::new();
        let who = vars.resolve("who").unwrap();
        vars.set(who, "world").unwrap();
        let arg = text_arg(
            "hello %who%!",
            vec![Deref {
                start: 6,
                len: 5,
                target: DerefTarget::Static(who),
            }],
        );
        let line = Line::new(Action::Sleep, Provenance::default(), vec![arg]);
        let mut scratch = ScratchBuf::new(1 << 16);
        let v = view();
        let args = expand_args(&line, &mut scratch, &mut vars, &v).unwrap();
        assert_eq!(args.text(0, &scratch), "hello world!");
    }

    #[test]
    fn dynamic_output_var_is_created() {
        let mut vars = VarTable::new();
        let i = vars.resolve("i").unwrap();
        vars.set(i, 7).unwrap();
        let out = Arg {
            kind: ArgKind::OutputVar,
            text: "Item%i%".to_string(),
            is_expression: false,
            derefs: vec![Deref {
                start: 0,
                len: 7,
                target: DerefTarget::Dynamic(vec![
                    NamePart::Literal("Item".to_string()),
                    NamePart::Var(i),
                ]),
            }],
        };
        let line = Line::new(
            Action::Assign(AssignOp::Text),
            Provenance::default(),
            vec![out, Arg::text("x")],
        );
        let mut scratch = ScratchBuf::new(1 << 16);
        let v = view();
        let args = expand_args(&line, &mut scratch, &mut vars, &v).unwrap();
        assert_eq!(args.output(0), vars.find("item7"));
        assert!(args.output(0).is_some());
    }

    #[test]
    fn expanding_twice_gives_the_same_text() {
        let mut vars = VarTable::new();
        let who = vars.resolve("who").unwrap();
        vars.set(who, "again").unwrap();
        let arg = text_arg(
            "%who% and %who%",
            vec![
                Deref {
                    start: 0,
                    len: 5,
                    target: DerefTarget::Static(who),
                },
                Deref {
                    start: 10,
                    len: 5,
                    target: DerefTarget::Static(who),
                },
            ],
        );
        let line = Line::new(Action::Sleep, Provenance::default(), vec![arg]);
        let mut scratch = ScratchBuf::new(1 << 16);
        let v = view();
        let mark = scratch.mark();
        let first = expand_args(&line, &mut scratch, &mut vars, &v).unwrap();
        let first = first.text(0, &scratch).to_string();
        scratch.release(mark);
        let second = expand_args(&line, &mut scratch, &mut vars, &v).unwrap();
        assert_eq!(first, "again and again");
        assert_eq!(second.text(0, &scratch), first);
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn expansion_over_the_ceiling_fails() {
        let mut vars = VarTable::new();
        let big = vars.resolve("big").unwrap();
        vars.set(big, "x".repeat(100)).unwrap();
        let arg = text_arg(
            "%big%",
            vec![Deref {
                start: 0,
                len: 5,
                target: DerefTarget::Static(big),
            }],
        );
        let line = Line::new(Action::Sleep, Provenance::default(), vec![arg]);
        let mut scratch = ScratchBuf::new(64);
        let v = view();
        let err = expand_args(&line, &mut scratch, &mut vars, &v).unwrap_err();
        assert!(matches!(err, ErrorKind::OutOfMemory { needed: 100, .. }));
    }
}
