#![forbid(unsafe_code)]

//! The line walker. `exec_until` runs lines from a starting point under one
//! of four modes and reports how it stopped through [`Flow`]; nothing here
//! unwinds. Runtime errors come back as `Err` and end the current thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hotscript_line::lex::Op;
use hotscript_line::{
    Action, AssignOp, Attribute, CommandId, IfCond, LabelId, Line, LineId, LoopKind, Script, Value,
};

use crate::coerce::{self, parse_number, Number};
use crate::cond;
use crate::engine::Engine;
use crate::error::{ErrorKind, RuntimeError};
use crate::expand::{expand_args, BuiltinView, ExpandedArgs};
use crate::expr;
use crate::loops::LoopContext;
use crate::perform::{LeafContext, LeafStatus, Perform};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Until the line sequence runs out. Used for the auto-execute section.
    ToEnd,
    /// Until a `Return` at this level (threads and Gosub).
    UntilReturn,
    /// Until the `}` closing the block that contains the start line.
    UntilBlockEnd,
    /// One statement, which may be a whole block or an if/else chain.
    OnlyOneLine,
}

/// How a run of lines ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Return,
    Break,
    Continue,
    /// A jump whose target lies outside the frame that saw it; frames pass
    /// it up until one contains the target.
    Goto(LineId),
    Exit,
    /// The program is ending: every caller stops at once.
    ExitApp,
}

type Step = Result<(Flow, Option<LineId>), RuntimeError>;

fn runtime_error(script: &Script, id: LineId, kind: ErrorKind) -> RuntimeError {
    RuntimeError {
        kind,
        at: script.describe(id),
        line: id,
    }
}

impl<P: Perform> Engine<P> {
    pub(crate) fn exec_until(&mut self, start: LineId, mode: ExecMode) -> Result<Flow, RuntimeError> {
        let script = Arc::clone(&self.script);
        let limit = self.config.max_recursion_depth;
        if self.depth >= limit {
            return Err(runtime_error(&script, start, ErrorKind::TooDeep(limit)));
        }
        self.depth += 1;
        let result = self.walk(&script, start, mode);
        self.depth -= 1;
        result
    }

    fn walk(&mut self, script: &Script, start: LineId, mode: ExecMode) -> Result<Flow, RuntimeError> {
        let level = script.line(start).parent;
        let mut cur = Some(start);
        while let Some(id) = cur {
            let line = script.line(id);
            if line.action == Action::BlockEnd {
                if mode == ExecMode::UntilBlockEnd {
                    return Ok(Flow::Normal);
                }
                cur = line.next;
                continue;
            }
            self.tick(id);
            if self.terminated {
                return Ok(Flow::ExitApp);
            }

            let mark = self.scratch.mark();
            let stepped = self.step(script, id);
            self.scratch.release(mark);
            let (flow, next) = stepped?;
            if self.terminated {
                return Ok(Flow::ExitApp);
            }

            match flow {
                Flow::Normal => {}
                Flow::Goto(target)
                    if mode != ExecMode::OnlyOneLine && script.line(target).parent == level =>
                {
                    cur = Some(target);
                    continue;
                }
                Flow::Return if matches!(mode, ExecMode::UntilReturn | ExecMode::ToEnd) => {
                    return Ok(Flow::Normal);
                }
                other => return Ok(other),
            }
            if mode == ExecMode::OnlyOneLine {
                return Ok(Flow::Normal);
            }
            cur = next;
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn expand(&mut self, line: &Line) -> Result<ExpandedArgs, ErrorKind> {
        let view = BuiltinView {
            thread: self.threads.last(),
            prior_hotkey: &self.prior_hotkey,
            epoch: self.epoch,
        };
        expand_args(line, &mut self.scratch, &mut self.vars, &view)
    }

    fn step(&mut self, script: &Script, id: LineId) -> Step {
        let line = script.line(id);
        let at = |kind: ErrorKind| runtime_error(script, id, kind);
        let next = line.next;
        match line.action {
            Action::BlockBegin => {
                let flow = match next {
                    Some(first) => self.exec_until(first, ExecMode::UntilBlockEnd)?,
                    None => Flow::Normal,
                };
                let after = line.related.and_then(|end| script.line(end).next);
                Ok(if flow == Flow::Normal { (flow, after) } else { (flow, None) })
            }
            Action::BlockEnd => Ok((Flow::Normal, next)),
            // Reached only by falling off a then-branch or by a jump.
            Action::Else => Ok((Flow::Normal, line.related)),
            Action::If(cond) => {
                let truth = self.condition(line, cond).map_err(at)?;
                self.branch(script, id, truth)
            }
            Action::Loop => self.drive_loop(script, id),
            Action::Break => Ok((Flow::Break, None)),
            Action::Continue => Ok((Flow::Continue, None)),
            Action::Goto => {
                let target = self.jump_target(script, id).map_err(at)?;
                Ok((Flow::Goto(target), None))
            }
            Action::Gosub => {
                let target = self.jump_target(script, id).map_err(at)?;
                match self.exec_until(target, ExecMode::UntilReturn)? {
                    Flow::Normal => Ok((Flow::Normal, next)),
                    other => Ok((other, None)),
                }
            }
            Action::Return => Ok((Flow::Return, None)),
            Action::Exit => Ok((Flow::Exit, None)),
            Action::ExitApp => Ok((self.exit_app_flow(), None)),
            Action::Assign(op) => {
                self.assign(line, op).map_err(at)?;
                Ok((Flow::Normal, next))
            }
            Action::Sleep => {
                let args = self.expand(line).map_err(at)?;
                let ms = parse_number(args.text(0, &self.scratch)).map_or(0, Number::as_i64);
                self.sleep(ms);
                Ok((Flow::Normal, next))
            }
            Action::SetTimer => {
                self.set_timer(script, line).map_err(at)?;
                Ok((Flow::Normal, next))
            }
            Action::OnExit => {
                self.set_on_exit(script, line).map_err(at)?;
                Ok((Flow::Normal, next))
            }
            Action::Suspend => {
                self.suspend(line).map_err(at)?;
                Ok((Flow::Normal, next))
            }
            Action::Thread => {
                self.thread_settings(line).map_err(at)?;
                Ok((Flow::Normal, next))
            }
            Action::Command(cmd) => self.leaf(script, id, cmd),
        }
    }

    fn condition(&mut self, line: &Line, cond: IfCond) -> Result<bool, ErrorKind> {
        let args = self.expand(line)?;
        if cond == IfCond::Expr {
            return Ok(args.value(0).is_some_and(coerce::is_true));
        }
        let texts: Vec<&str> = (0..args.len()).map(|i| args.text(i, &self.scratch)).collect();
        cond::evaluate(cond, &texts)
    }

    /// Runs the then-branch or the else-branch of an if-family line.
    fn branch(&mut self, script: &Script, id: LineId, truth: bool) -> Step {
        let line = script.line(id);
        let else_line = script.else_of(id);
        let (body, after) = match (truth, else_line) {
            (true, Some(e)) => (line.next, script.line(e).related),
            (true, None) => (line.next, line.related),
            (false, Some(e)) => (script.line(e).next, script.line(e).related),
            (false, None) => return Ok((Flow::Normal, line.related)),
        };
        let flow = match body {
            Some(body) => self.exec_until(body, ExecMode::OnlyOneLine)?,
            None => Flow::Normal,
        };
        Ok(if flow == Flow::Normal { (flow, after) } else { (flow, None) })
    }

    fn drive_loop(&mut self, script: &Script, id: LineId) -> Step {
        let line = script.line(id);
        let at = |kind: ErrorKind| runtime_error(script, id, kind);
        let kind = match line.attribute {
            Attribute::Loop(kind) => kind,
            _ => LoopKind::Count,
        };
        let ctx = {
            let args = self.expand(line).map_err(at)?;
            let texts: Vec<&str> = (0..args.len()).map(|i| args.text(i, &self.scratch)).collect();
            LoopContext::start(kind, &texts).map_err(at)?
        };
        let Some(body) = line.next else {
            return Ok((Flow::Normal, line.related));
        };

        let Some(thread) = self.threads.last_mut() else {
            return Ok((Flow::Normal, line.related));
        };
        thread.loops.push(ctx);
        let result = self.iterate(script, id, body);
        if let Some(thread) = self.threads.last_mut() {
            thread.loops.pop();
        }
        match result? {
            Flow::Normal => Ok((Flow::Normal, line.related)),
            other => Ok((other, None)),
        }
    }

    fn iterate(&mut self, script: &Script, id: LineId, body: LineId) -> Result<Flow, RuntimeError> {
        loop {
            if !self.advance_loop().map_err(|kind| runtime_error(script, id, kind))? {
                return Ok(Flow::Normal);
            }
            match self.exec_until(body, ExecMode::OnlyOneLine)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
    }

    fn advance_loop(&mut self) -> Result<bool, ErrorKind> {
        let registry = self.registry.as_ref();
        match self.threads.last_mut().and_then(|t| t.loops.last_mut()) {
            Some(l) => l.advance(registry),
            None => Ok(false),
        }
    }

    /// Label named by arg 0 of a jumping line.
    fn label_arg(&mut self, script: &Script, line: &Line) -> Result<Option<LabelId>, ErrorKind> {
        if let Attribute::Label(label) = line.attribute {
            return Ok(Some(label));
        }
        let args = self.expand(line)?;
        let name = args.text(0, &self.scratch).trim();
        if name.is_empty() {
            return Ok(None);
        }
        script
            .labels
            .find(name)
            .map(Some)
            .ok_or_else(|| ErrorKind::UnknownLabel(name.to_string()))
    }

    fn jump_target(&mut self, script: &Script, id: LineId) -> Result<LineId, ErrorKind> {
        let line = script.line(id);
        let dynamic = !matches!(line.attribute, Attribute::Label(_));
        let Some(label) = self.label_arg(script, line)? else {
            return Err(ErrorKind::UnknownLabel(String::new()));
        };
        let target = script.labels.get(label).target;
        // Literal targets were checked at load.
        if dynamic && !script.is_jump_valid(id, target) {
            return Err(ErrorKind::InvalidJump(script.labels.get(label).name.clone()));
        }
        Ok(target)
    }

    fn exit_app_flow(&mut self) -> Flow {
        match self.on_exit {
            Some(label) if !self.exit_running => {
                self.run_on_exit(label);
                if self.terminated { Flow::ExitApp } else { Flow::Exit }
            }
            _ => {
                self.terminated = true;
                Flow::ExitApp
            }
        }
    }

    fn assign(&mut self, line: &Line, op: AssignOp) -> Result<(), ErrorKind> {
        let args = self.expand(line)?;
        let Some(var) = args.output(0) else {
            return Err(ErrorKind::BadParameter("blank output variable".to_string()));
        };
        let value = match op {
            AssignOp::Text => {
                let text = args.text(1, &self.scratch);
                let text = if self.config.auto_trim {
                    text.trim_matches([' ', '\t'])
                } else {
                    text
                };
                Value::from(text)
            }
            AssignOp::Expr => args.value(1).cloned().unwrap_or_default(),
            _ => {
                let current = coerce::to_number(self.vars.get(var)).unwrap_or(Number::Int(0));
                let operand = parse_number(args.text(1, &self.scratch)).unwrap_or(Number::Int(0));
                arithmetic_assign(op, current, operand)?
            }
        };
        self.vars.set(var, value)?;
        Ok(())
    }

    fn sleep(&mut self, ms: i64) {
        let deadline = Instant::now() + Duration::from_millis(ms.max(0) as u64);
        loop {
            self.wait_point();
            if self.terminated {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }

    fn set_timer(&mut self, script: &Script, line: &Line) -> Result<(), ErrorKind> {
        let label = match self.label_arg(script, line)? {
            Some(label) => label,
            // A blank label means the timer that launched this thread.
            None => self
                .threads
                .last()
                .and_then(|t| t.label)
                .ok_or_else(|| ErrorKind::UnknownLabel(String::new()))?,
        };
        let args = self.expand(line)?;
        let setting = args.text(1, &self.scratch).trim().to_ascii_lowercase();
        let (enabled, period) = match setting.as_str() {
            "" | "on" => (true, None),
            "off" => (false, None),
            other => match parse_number(other) {
                Some(n) => {
                    let ms = n.as_i64();
                    // Negative periods run once.
                    (true, Some((Duration::from_millis(ms.unsigned_abs()), ms < 0)))
                }
                None => {
                    return Err(ErrorKind::BadParameter(format!(
                        "SetTimer: invalid period \"{other}\""
                    )));
                }
            },
        };
        let priority = parse_number(args.text(2, &self.scratch)).map(|n| n.as_i64() as i32);
        tracing::debug!(label = %script.labels.get(label).name, enabled, "SetTimer");
        self.timers.set(
            label,
            enabled,
            period,
            priority,
            Duration::from_millis(self.config.default_timer_period_ms),
            Instant::now(),
        );
        Ok(())
    }

    fn set_on_exit(&mut self, script: &Script, line: &Line) -> Result<(), ErrorKind> {
        self.on_exit = self.label_arg(script, line)?;
        Ok(())
    }

    fn suspend(&mut self, line: &Line) -> Result<(), ErrorKind> {
        let args = self.expand(line)?;
        let mode = args.text(0, &self.scratch).trim().to_ascii_lowercase();
        self.suspended = match mode.as_str() {
            "" | "toggle" => !self.suspended,
            "on" => true,
            "off" => false,
            "permit" => self.suspended,
            other => {
                return Err(ErrorKind::BadParameter(format!(
                    "Suspend: invalid mode \"{other}\""
                )));
            }
        };
        tracing::info!(suspended = self.suspended, "hotkey suspension changed");
        Ok(())
    }

    fn thread_settings(&mut self, line: &Line) -> Result<(), ErrorKind> {
        let args = self.expand(line)?;
        let number = |i: usize| parse_number(args.text(i, &self.scratch)).map(Number::as_i64);
        let sub = args.text(0, &self.scratch).trim().to_ascii_lowercase();
        match sub.as_str() {
            "priority" => {
                let priority = number(1).unwrap_or(0) as i32;
                if let Some(t) = self.threads.last_mut() {
                    t.priority = priority;
                }
            }
            "interrupt" => {
                let (ms, lines) = (number(1), number(2));
                if let Some(ms) = ms {
                    self.interrupt_ms = ms.max(0) as u64;
                }
                if let Some(lines) = lines {
                    self.interrupt_lines = lines.max(0) as u64;
                }
            }
            other => {
                return Err(ErrorKind::BadParameter(format!(
                    "Thread: unknown sub-command \"{other}\""
                )));
            }
        }
        Ok(())
    }

    fn leaf(&mut self, script: &Script, id: LineId, cmd: CommandId) -> Step {
        let line = script.line(id);
        let spec = script.commands.get(cmd);
        let at = |kind: ErrorKind| runtime_error(script, id, kind);
        if spec.waits {
            self.wait_point();
            if self.terminated {
                return Ok((Flow::ExitApp, None));
            }
        }
        let args = self.expand(line).map_err(at)?;
        let last_result = self.threads.last().and_then(|t| t.last_result.clone());
        let status = {
            let Engine {
                performer,
                scratch,
                vars,
                threads,
                queue,
                error_level,
                ..
            } = self;
            let mut ctx = LeafContext {
                args: &args,
                scratch: &*scratch,
                vars,
                error_level: *error_level,
                loops: threads
                    .last_mut()
                    .map(|t| t.loops.as_mut_slice())
                    .unwrap_or_default(),
                triggers: &*queue,
                last_result,
            };
            performer.perform(spec, &mut ctx)
        };
        tracing::trace!(command = %spec.name, ?status, "leaf command");
        if let Some(t) = self.threads.last_mut() {
            t.last_result = Some(status.clone());
        }
        match status {
            LeafStatus::Fail(message) => Err(at(ErrorKind::CommandFailed {
                command: spec.name.clone(),
                message,
            })),
            truth @ (LeafStatus::True | LeafStatus::False) if spec.conditional => {
                self.branch(script, id, truth == LeafStatus::True)
            }
            _ => Ok((Flow::Normal, line.next)),
        }
    }
}

fn arithmetic_assign(op: AssignOp, current: Number, operand: Number) -> Result<Value, ErrorKind> {
    let (a, b) = (Value::from(current), Value::from(operand));
    match op {
        AssignOp::Add => expr::arithmetic(Op::Add, &a, &b),
        AssignOp::Sub => expr::arithmetic(Op::Sub, &a, &b),
        AssignOp::Mult => expr::arithmetic(Op::Mul, &a, &b),
        AssignOp::Div => match (current, operand) {
            (_, d) if d.is_zero() => Err(ErrorKind::DivideByZero),
            (Number::Int(x), Number::Int(y)) => Ok(Value::Int(x.wrapping_div(y))),
            (x, y) => Ok(Value::Float(x.as_f64() / y.as_f64())),
        },
        AssignOp::Text | AssignOp::Expr => Ok(b),
    }
}
