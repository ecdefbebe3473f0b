#![forbid(unsafe_code)]

use hotscript_line::lex::{self, TokenKind};
use hotscript_line::{
    Action, Arg, ArgKind, AssignOp, Attribute, CommandSet, CompareOp, Deref, DerefTarget, FileId,
    IfCond, Line, LineId, LoopKind, NamePart, Program, Provenance, RegRoot, Script, VarTable,
    MAX_ARGS, MAX_DEREFS_PER_ARG,
};

use crate::error::LoadError;
use crate::preparse;
use crate::statement::{RawArg, Statement};

/// Appends one line per statement to the program's line sequence. Call
/// [`Builder::finish`] once every statement has been added to structure and
/// validate the result.
pub struct Builder {
    script: Script,
    vars: VarTable,
    file: FileId,
    pending_labels: Vec<(String, u32)>,
    last_line_no: u32,
}

impl Builder {
    pub fn new(commands: CommandSet) -> Self {
        let mut vars = VarTable::new();
        // Every thread saves and restores it, so it always exists.
        vars.intern("ErrorLevel");
        Self {
            script: Script {
                commands,
                ..Script::default()
            },
            vars,
            file: FileId(0),
            pending_labels: Vec::new(),
            last_line_no: 0,
        }
    }

    /// Starts attributing subsequent statements to `name`.
    pub fn begin_file(&mut self, name: impl Into<String>) -> FileId {
        let id = FileId(self.script.files.len() as u16);
        self.script.files.push(name.into());
        self.file = id;
        id
    }

    pub fn line_count(&self) -> usize {
        self.script.lines.len()
    }

    /// Declares a label naming whichever line is added next.
    pub fn add_label(&mut self, name: &str, line_no: u32) -> Result<(), LoadError> {
        let name = name.trim();
        if name.is_empty() || name.contains(',') || name.contains(char::is_whitespace) {
            return Err(self.error(line_no, format!("invalid label name \"{name}\"")));
        }
        let taken = self.script.labels.find(name).is_some()
            || self
                .pending_labels
                .iter()
                .any(|(n, _)| n.eq_ignore_ascii_case(name));
        if taken {
            return Err(self.error(line_no, format!("duplicate label \"{name}\"")));
        }
        self.pending_labels.push((name.to_string(), line_no));
        Ok(())
    }

    pub fn add_statement(&mut self, stmt: Statement) -> Result<(), LoadError> {
        let Statement {
            keyword,
            mut args,
            line_no,
            same_line,
        } = stmt;
        let lower = keyword.trim().to_ascii_lowercase();

        while args.last().is_some_and(|a| a.text.is_empty()) && args.len() > 1 {
            args.pop();
        }
        if args.len() > MAX_ARGS {
            return Err(self.error(line_no, "too many parameters"));
        }

        match lower.as_str() {
            "repeat" => {
                let count = args
                    .first()
                    .map(|a| a.text.trim().to_string())
                    .filter(|t| !t.is_empty() && t != "0");
                let loop_args = count.into_iter().map(RawArg::plain).collect();
                self.push_line(Action::Loop, loop_args, line_no)?;
                self.push_line(Action::BlockBegin, Vec::new(), line_no)?;
                return self.no_same_line(same_line, line_no);
            }
            "endrepeat" => {
                self.push_line(Action::BlockEnd, Vec::new(), line_no)?;
                return self.no_same_line(same_line, line_no);
            }
            _ => {}
        }

        let (action, args) = self.classify(&lower, &keyword, args, line_no)?;
        let id = self.push_line(action, args, line_no)?;

        if let Some(next) = same_line {
            if !(self.script.is_if_family(id) || action == Action::Else) {
                return Err(self.error(
                    line_no,
                    format!("\"{}\" cannot have an action on the same line", keyword.trim()),
                ));
            }
            self.add_statement(*next)?;
        }
        Ok(())
    }

    /// Appends the implicit trailing `Exit`, structures blocks and branches,
    /// and resolves literal jump targets.
    pub fn finish(mut self) -> Result<Program, LoadError> {
        let exit = self.push_line(Action::Exit, Vec::new(), self.last_line_no + 1)?;
        let mut script = self.script;
        preparse::run(&mut script, exit)?;
        tracing::debug!(
            lines = script.lines.len(),
            labels = script.labels.len(),
            vars = self.vars.len(),
            "script loaded"
        );
        Ok(Program {
            script,
            vars: self.vars,
        })
    }

    fn no_same_line(
        &self,
        same_line: Option<Box<Statement>>,
        line_no: u32,
    ) -> Result<(), LoadError> {
        match same_line {
            Some(_) => Err(self.error(line_no, "an action on the same line is not allowed here")),
            None => Ok(()),
        }
    }

    fn error(&self, line_no: u32, message: impl Into<String>) -> LoadError {
        let file = self
            .script
            .files
            .get(self.file.0 as usize)
            .map_or("<script>", String::as_str);
        LoadError::new(file, line_no, message)
    }

    fn classify(
        &self,
        lower: &str,
        keyword: &str,
        mut args: Vec<RawArg>,
        line_no: u32,
    ) -> Result<(Action, Vec<RawArg>), LoadError> {
        let action = match lower {
            "=" => Action::Assign(AssignOp::Text),
            ":=" => Action::Assign(AssignOp::Expr),
            "+=" => Action::Assign(AssignOp::Add),
            "-=" => Action::Assign(AssignOp::Sub),
            "*=" => Action::Assign(AssignOp::Mult),
            "/=" => Action::Assign(AssignOp::Div),
            "if" => return self.classify_if(args, line_no),
            "ifequal" => Action::If(IfCond::Compare(CompareOp::Equal)),
            "ifnotequal" => Action::If(IfCond::Compare(CompareOp::NotEqual)),
            "ifgreater" => Action::If(IfCond::Compare(CompareOp::Greater)),
            "ifgreaterorequal" => Action::If(IfCond::Compare(CompareOp::GreaterOrEqual)),
            "ifless" => Action::If(IfCond::Compare(CompareOp::Less)),
            "iflessorequal" => Action::If(IfCond::Compare(CompareOp::LessOrEqual)),
            "else" => Action::Else,
            "{" => Action::BlockBegin,
            "}" => Action::BlockEnd,
            "loop" => Action::Loop,
            "break" => Action::Break,
            "continue" => Action::Continue,
            "goto" => Action::Goto,
            "gosub" => Action::Gosub,
            "return" => Action::Return,
            "exit" => Action::Exit,
            "exitapp" => Action::ExitApp,
            "sleep" => Action::Sleep,
            "settimer" => Action::SetTimer,
            "onexit" => Action::OnExit,
            "suspend" => Action::Suspend,
            "thread" => Action::Thread,
            _ => match self.script.commands.find(keyword.trim()) {
                Some(id) => Action::Command(id),
                None => {
                    return Err(self.error(
                        line_no,
                        format!("\"{}\" is not a recognized action", keyword.trim()),
                    ));
                }
            },
        };
        if matches!(action, Action::If(IfCond::Compare(_))) && args.len() == 1 {
            args.push(RawArg::default());
        }
        Ok((action, args))
    }

    /// `if (expr)` has a single arg; the operator notation arrives as
    /// `[var, op, value...]` and is reshaped to `[var, value...]`.
    fn classify_if(
        &self,
        mut args: Vec<RawArg>,
        line_no: u32,
    ) -> Result<(Action, Vec<RawArg>), LoadError> {
        if args.len() <= 1 {
            return Ok((Action::If(IfCond::Expr), args));
        }
        let op = args.remove(1).text.trim().to_ascii_lowercase();
        let op = op.split_whitespace().collect::<Vec<_>>().join(" ");
        let cond = match op.as_str() {
            "=" => IfCond::Compare(CompareOp::Equal),
            "<>" | "!=" => IfCond::Compare(CompareOp::NotEqual),
            ">" => IfCond::Compare(CompareOp::Greater),
            ">=" => IfCond::Compare(CompareOp::GreaterOrEqual),
            "<" => IfCond::Compare(CompareOp::Less),
            "<=" => IfCond::Compare(CompareOp::LessOrEqual),
            "between" => IfCond::Between { negate: false },
            "not between" => IfCond::Between { negate: true },
            "in" => IfCond::In { negate: false },
            "not in" => IfCond::In { negate: true },
            "contains" => IfCond::Contains { negate: false },
            "not contains" => IfCond::Contains { negate: true },
            "is" => IfCond::Is { negate: false },
            "is not" => IfCond::Is { negate: true },
            other => {
                return Err(self.error(line_no, format!("unrecognized if operator \"{other}\"")));
            }
        };
        if matches!(cond, IfCond::Compare(_)) && args.len() == 1 {
            args.push(RawArg::default());
        }
        Ok((Action::If(cond), args))
    }

    fn arg_bounds(&self, action: Action) -> (usize, usize) {
        match action {
            Action::Assign(AssignOp::Text) => (1, 2),
            Action::Assign(_) => (2, 2),
            Action::If(IfCond::Expr) => (1, 1),
            Action::If(IfCond::Between { .. }) => (3, 3),
            Action::If(_) => (2, 2),
            Action::Else
            | Action::BlockBegin
            | Action::BlockEnd
            | Action::Break
            | Action::Continue
            | Action::Return => (0, 0),
            Action::Exit | Action::ExitApp | Action::OnExit | Action::Suspend => (0, 1),
            Action::Loop => (0, 4),
            Action::Goto | Action::Gosub | Action::Sleep => (1, 1),
            Action::SetTimer | Action::Thread => (1, 3),
            Action::Command(id) => {
                let spec = self.script.commands.get(id);
                (spec.min_args, spec.max_args)
            }
        }
    }

    fn push_line(
        &mut self,
        action: Action,
        raw_args: Vec<RawArg>,
        line_no: u32,
    ) -> Result<LineId, LoadError> {
        let (min, max) = self.arg_bounds(action);
        let given = if raw_args.len() == 1 && raw_args[0].text.is_empty() && min == 0 {
            0
        } else {
            raw_args.len()
        };
        if given < min {
            return Err(self.error(line_no, format!("{}: too few parameters", action.name())));
        }
        if given > max {
            return Err(self.error(line_no, format!("{}: too many parameters", action.name())));
        }

        let mut attribute = Attribute::None;
        let mut args = Vec::with_capacity(given);
        for (pos, raw) in raw_args.iter().take(given).enumerate() {
            let kind = arg_kind(action, attribute, pos, &self.script.commands);
            let is_expression = is_expression_arg(action, pos);
            let arg = self
                .build_arg(kind, is_expression, raw)
                .map_err(|m| self.error(line_no, m))?;
            if kind == ArgKind::OutputVar
                && pos < min
                && arg.derefs.is_empty()
            {
                return Err(self.error(line_no, format!("{}: output variable is blank", action.name())));
            }
            args.push(arg);
            if action == Action::Loop && pos == 0 {
                attribute = Attribute::Loop(classify_loop(&args[0]));
            }
        }
        if action == Action::Loop {
            if args.is_empty() {
                attribute = Attribute::Loop(LoopKind::Count);
            }
            check_loop_args(attribute, &args).map_err(|m| self.error(line_no, m))?;
        }
        check_literal_options(action, &args).map_err(|m| self.error(line_no, m))?;

        let id = LineId(self.script.lines.len() as u32);
        let mut line = Line::new(
            action,
            Provenance {
                file: self.file,
                line: line_no,
            },
            args,
        );
        line.attribute = attribute;
        if let Some(prev) = id.0.checked_sub(1).map(LineId) {
            line.prev = Some(prev);
            self.script.lines[prev.index()].next = Some(id);
        }
        self.script.lines.push(line);

        for (name, _) in self.pending_labels.drain(..) {
            // Duplicates were rejected in add_label.
            let _ = self.script.labels.insert(&name, id);
        }
        self.last_line_no = self.last_line_no.max(line_no);
        Ok(id)
    }

    fn build_arg(&mut self, kind: ArgKind, is_expression: bool, raw: &RawArg) -> Result<Arg, String> {
        let (text, derefs) = match kind {
            ArgKind::Text if is_expression => (raw.text.clone(), self.expression_derefs(&raw.text)?),
            ArgKind::Text => (raw.text.clone(), self.text_derefs(raw)?),
            ArgKind::InputVar | ArgKind::OutputVar => {
                let lead = raw.text.len() - raw.text.trim_start().len();
                let name = raw.text.trim();
                if name.is_empty() {
                    (String::new(), Vec::new())
                } else {
                    let target = self.name_target(name, |off| raw.is_literal_at(off + lead))?;
                    if let (ArgKind::OutputVar, DerefTarget::Static(id)) = (kind, &target) {
                        if self.vars.builtin(*id).is_some() {
                            return Err(format!("\"{name}\" is a read-only variable"));
                        }
                    }
                    let deref = Deref {
                        start: 0,
                        len: name.len(),
                        target,
                    };
                    (name.to_string(), vec![deref])
                }
            }
        };
        if derefs.len() > MAX_DEREFS_PER_ARG {
            return Err(format!(
                "too many variable references in one parameter (max {MAX_DEREFS_PER_ARG})"
            ));
        }
        Ok(Arg {
            kind,
            text,
            is_expression,
            derefs,
        })
    }

    /// Locates `%name%` references in free text.
    fn text_derefs(&mut self, raw: &RawArg) -> Result<Vec<Deref>, String> {
        let mut derefs = Vec::new();
        let mut open: Option<usize> = None;
        for (i, c) in raw.text.char_indices() {
            if c != '%' || raw.is_literal_at(i) {
                continue;
            }
            match open.take() {
                None => open = Some(i),
                Some(start) => {
                    let name = &raw.text[start + 1..i];
                    if name.is_empty() {
                        return Err("empty variable reference (%%)".to_string());
                    }
                    let id = self.vars.resolve(name).map_err(|e| e.to_string())?;
                    derefs.push(Deref {
                        start,
                        len: i + 1 - start,
                        target: DerefTarget::Static(id),
                    });
                }
            }
        }
        if open.is_some() {
            return Err("this parameter contains a variable name missing its ending percent sign".to_string());
        }
        Ok(derefs)
    }

    /// Records each variable operand of an expression.
    fn expression_derefs(&mut self, text: &str) -> Result<Vec<Deref>, String> {
        let tokens = lex::tokenize(text)?;
        let mut derefs = Vec::new();
        for tok in tokens {
            if tok.kind != TokenKind::Operand {
                continue;
            }
            let target = self.name_target(tok.text(text), |_| false)?;
            derefs.push(Deref {
                start: tok.start,
                len: tok.len,
                target,
            });
        }
        Ok(derefs)
    }

    /// Resolves a variable name that may contain `%var%` parts.
    fn name_target(
        &mut self,
        name: &str,
        is_literal: impl Fn(usize) -> bool,
    ) -> Result<DerefTarget, String> {
        let marks: Vec<usize> = name
            .char_indices()
            .filter(|&(i, c)| c == '%' && !is_literal(i))
            .map(|(i, _)| i)
            .collect();
        if marks.is_empty() {
            let id = self.vars.resolve(name).map_err(|e| e.to_string())?;
            return Ok(DerefTarget::Static(id));
        }
        if marks.len() % 2 != 0 {
            return Err(format!("variable name \"{name}\" is missing an ending percent sign"));
        }
        let mut parts = Vec::new();
        let mut pos = 0;
        for pair in marks.chunks(2) {
            let (open, close) = (pair[0], pair[1]);
            let literal = &name[pos..open];
            if !literal.is_empty() {
                if let Some(ch) = literal.chars().find(|c| !hotscript_line::var::is_name_char(*c)) {
                    return Err(format!("variable name \"{name}\" contains an illegal character '{ch}'"));
                }
                parts.push(NamePart::Literal(literal.to_string()));
            }
            let inner = &name[open + 1..close];
            if inner.is_empty() {
                return Err("empty variable reference (%%)".to_string());
            }
            let id = self.vars.resolve(inner).map_err(|e| e.to_string())?;
            parts.push(NamePart::Var(id));
            pos = close + 1;
        }
        let tail = &name[pos..];
        if !tail.is_empty() {
            if let Some(ch) = tail.chars().find(|c| !hotscript_line::var::is_name_char(*c)) {
                return Err(format!("variable name \"{name}\" contains an illegal character '{ch}'"));
            }
            parts.push(NamePart::Literal(tail.to_string()));
        }
        Ok(DerefTarget::Dynamic(parts))
    }
}

/// Arg kind for position `pos` of a line.
pub fn arg_kind(action: Action, attribute: Attribute, pos: usize, commands: &CommandSet) -> ArgKind {
    match action {
        Action::Assign(_) if pos == 0 => ArgKind::OutputVar,
        Action::If(IfCond::Expr) => ArgKind::Text,
        Action::If(_) if pos == 0 => ArgKind::InputVar,
        Action::Loop if pos == 1 && attribute == Attribute::Loop(LoopKind::Parse) => {
            ArgKind::InputVar
        }
        Action::Command(id) => commands.get(id).arg_kind(pos),
        _ => ArgKind::Text,
    }
}

fn is_expression_arg(action: Action, pos: usize) -> bool {
    matches!(
        (action, pos),
        (Action::Assign(AssignOp::Expr), 1) | (Action::If(IfCond::Expr), 0)
    )
}

fn classify_loop(first: &Arg) -> LoopKind {
    if !first.is_literal() {
        return LoopKind::Unknown;
    }
    let text = first.text.trim();
    if text.is_empty() || text.parse::<i64>().is_ok() {
        LoopKind::Count
    } else if text.eq_ignore_ascii_case("parse") {
        LoopKind::Parse
    } else if text.eq_ignore_ascii_case("read") {
        LoopKind::ReadFile
    } else if RegRoot::from_name(text).is_some() {
        LoopKind::Registry
    } else {
        LoopKind::File
    }
}

fn literal_in(args: &[Arg], pos: usize, allowed: &[&str]) -> bool {
    match args.get(pos) {
        Some(arg) if arg.is_literal() => {
            let t = arg.text.trim();
            t.is_empty() || allowed.iter().any(|a| t.eq_ignore_ascii_case(a))
        }
        _ => true,
    }
}

fn check_loop_args(attribute: Attribute, args: &[Arg]) -> Result<(), String> {
    let Attribute::Loop(kind) = attribute else {
        return Ok(());
    };
    let (min, max) = match kind {
        LoopKind::Count => (0, 1),
        LoopKind::File => (1, 3),
        LoopKind::Unknown | LoopKind::Registry => (1, 4),
        LoopKind::Parse => (2, 4),
        LoopKind::ReadFile => (2, 3),
    };
    if args.len() < min {
        return Err("Loop: too few parameters".to_string());
    }
    if args.len() > max {
        return Err("Loop: too many parameters".to_string());
    }
    // An unknown kind may turn out to be a registry loop, whose arg 1 is a key.
    let (mode_pos, recurse_pos) = match kind {
        LoopKind::File => (1, 2),
        LoopKind::Registry => (2, 3),
        _ => return Ok(()),
    };
    if !literal_in(args, mode_pos, &["0", "1", "2"]) {
        return Err(if kind == LoopKind::Registry {
            "Loop: invalid registry mode (must be 0, 1 or 2)".to_string()
        } else {
            "Loop: invalid file mode (must be 0, 1 or 2)".to_string()
        });
    }
    if !literal_in(args, recurse_pos, &["0", "1"]) {
        return Err("Loop: recurse must be 0 or 1".to_string());
    }
    Ok(())
}

fn check_literal_options(action: Action, args: &[Arg]) -> Result<(), String> {
    match action {
        Action::Suspend if !literal_in(args, 0, &["on", "off", "toggle", "permit"]) => {
            Err("Suspend: parameter must be On, Off, Toggle or Permit".to_string())
        }
        Action::Thread if !literal_in(args, 0, &["priority", "interrupt"]) => {
            Err("Thread: unknown sub-command".to_string())
        }
        Action::SetTimer => match args.get(1) {
            Some(arg) if arg.is_literal() => {
                let t = arg.text.trim();
                let ok = t.is_empty()
                    || t.eq_ignore_ascii_case("on")
                    || t.eq_ignore_ascii_case("off")
                    || t.parse::<i64>().is_ok();
                if ok {
                    Ok(())
                } else {
                    Err("SetTimer: period must be On, Off or a number".to_string())
                }
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}
