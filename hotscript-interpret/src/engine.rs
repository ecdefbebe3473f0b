#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotscript_line::{LabelId, LineId, Program, Script, Value, VarId, VarTable};

use crate::config::EngineConfig;
use crate::error::RuntimeError;
use crate::exec::{ExecMode, Flow};
use crate::loops::{MemoryRegistry, Registry};
use crate::perform::Perform;
use crate::scratch::ScratchBuf;
use crate::thread::{ThreadContext, TimerTable, Trigger, TriggerKind, TriggerSender};

/// How many executed lines are kept for diagnostics.
pub const RECENT_LINES: usize = 200;

/// What happened to a trigger handed to [`Engine::dispatch`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// A thread ran to completion.
    Ran,
    /// Queued until the current thread can be interrupted.
    Deferred,
    /// Dropped: unknown label, too many threads of that label, or suspended.
    Refused,
}

enum Decision {
    Run(LabelId),
    Defer,
    Refuse,
}

/// Runs a loaded program. Threads are nested calls on this engine: a thread
/// that interrupts another runs to completion before the interrupted one
/// resumes.
pub struct Engine<P: Perform> {
    pub(crate) script: Arc<Script>,
    pub(crate) vars: VarTable,
    pub(crate) performer: P,
    pub(crate) registry: Box<dyn Registry>,
    pub(crate) config: EngineConfig,
    pub(crate) scratch: ScratchBuf,
    pub(crate) threads: Vec<ThreadContext>,
    pub(crate) queue: TriggerSender,
    pub(crate) timers: TimerTable,
    pub(crate) on_exit: Option<LabelId>,
    pub(crate) exit_running: bool,
    pub(crate) suspended: bool,
    pub(crate) terminated: bool,
    pub(crate) waiting: bool,
    pub(crate) depth: usize,
    pub(crate) error_level: VarId,
    pub(crate) epoch: Instant,
    pub(crate) prior_hotkey: String,
    pub(crate) interrupt_ms: u64,
    pub(crate) interrupt_lines: u64,
    last_hotkey: String,
    errors: Vec<RuntimeError>,
    recent: VecDeque<LineId>,
    batch_lines: u32,
    batch_started: Instant,
}

impl<P: Perform> Engine<P> {
    pub fn new(program: Program, performer: P, config: EngineConfig) -> Self {
        let Program { script, mut vars } = program;
        let error_level = vars.intern("ErrorLevel");
        let now = Instant::now();
        Self {
            script: Arc::new(script),
            vars,
            performer,
            registry: Box::new(MemoryRegistry::new()),
            scratch: ScratchBuf::new(config.max_mem),
            threads: Vec::new(),
            queue: TriggerSender::default(),
            timers: TimerTable::default(),
            on_exit: None,
            exit_running: false,
            suspended: false,
            terminated: false,
            waiting: false,
            depth: 0,
            error_level,
            epoch: now,
            prior_hotkey: String::new(),
            interrupt_ms: config.uninterruptible_ms,
            interrupt_lines: config.uninterrupted_lines,
            last_hotkey: String::new(),
            errors: Vec::new(),
            recent: VecDeque::with_capacity(RECENT_LINES),
            batch_lines: 0,
            batch_started: now,
            config,
        }
    }

    pub fn with_registry(mut self, registry: impl Registry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// A handle for queueing triggers from outside the engine.
    pub fn sender(&self) -> TriggerSender {
        self.queue.clone()
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Runs the program from its first line as the auto-execute thread.
    pub fn run_auto_execute(&mut self) {
        let Some(first) = self.script.first_line() else {
            return;
        };
        let trigger = Trigger::new(TriggerKind::Internal, "");
        tracing::debug!("auto-execute section started");
        self.run_thread(first, None, &trigger);
    }

    /// Admits `trigger` now if it can be, otherwise queues or drops it.
    pub fn dispatch(&mut self, trigger: Trigger) -> Admission {
        match self.decide(&trigger) {
            Decision::Run(label) => {
                let start = self.script.labels.get(label).target;
                self.run_thread(start, Some(label), &trigger);
                Admission::Ran
            }
            Decision::Defer => {
                self.queue.send(trigger);
                Admission::Deferred
            }
            Decision::Refuse => Admission::Refused,
        }
    }

    /// Starts queued triggers (and due timers) in order. Stops at the first
    /// trigger that has to wait, so later ones never overtake it.
    pub fn run_pending(&mut self) -> usize {
        self.fire_due_timers(Instant::now());
        let mut ran = 0;
        while !self.terminated {
            let Some(trigger) = self.queue.front() else {
                break;
            };
            match self.decide(&trigger) {
                Decision::Run(label) => {
                    self.queue.pop_front();
                    let start = self.script.labels.get(label).target;
                    self.run_thread(start, Some(label), &trigger);
                    ran += 1;
                }
                Decision::Refuse => {
                    self.queue.pop_front();
                }
                Decision::Defer => break,
            }
        }
        ran
    }

    /// Queues a trigger for every timer whose period has elapsed.
    pub fn fire_due_timers(&mut self, now: Instant) -> usize {
        let due = self.timers.due(now);
        for &(label, priority) in &due {
            let name = self.script.labels.get(label).name.clone();
            self.queue.send(Trigger::timer(name, priority));
        }
        due.len()
    }

    /// Keeps servicing triggers and timers for `duration`, or until the
    /// program exits.
    pub fn idle(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.terminated {
            self.run_pending();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }

    /// Ends the program, running the OnExit routine first if one is set.
    pub fn exit_app(&mut self) {
        if self.terminated {
            return;
        }
        match self.on_exit {
            Some(label) if !self.exit_running => {
                self.run_on_exit(label);
                // Called from the host, the program ends either way.
                self.terminated = true;
            }
            _ => self.terminated = true,
        }
    }

    pub(crate) fn run_on_exit(&mut self, label: LabelId) {
        self.exit_running = true;
        let name = self.script.labels.get(label).name.clone();
        let trigger = Trigger::new(TriggerKind::OnExit, name);
        let start = self.script.labels.get(label).target;
        self.run_thread(start, Some(label), &trigger);
        self.exit_running = false;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn has_enabled_timers(&self) -> bool {
        self.timers.any_enabled()
    }

    pub fn take_errors(&mut self) -> Vec<RuntimeError> {
        std::mem::take(&mut self.errors)
    }

    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    pub fn var_text(&self, name: &str) -> Option<String> {
        self.vars.find(name).map(|id| self.vars.get(id).to_string())
    }

    /// Most recently executed lines, oldest first.
    pub fn recent_lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.recent.iter().copied()
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Bytes of the scratch buffer currently held by running lines.
    pub fn scratch_in_use(&self) -> usize {
        self.scratch.len()
    }

    pub fn thread_depth(&self) -> usize {
        self.threads.len()
    }

    pub fn performer(&self) -> &P {
        &self.performer
    }

    pub fn performer_mut(&mut self) -> &mut P {
        &mut self.performer
    }

    fn decide(&self, trigger: &Trigger) -> Decision {
        if self.terminated {
            return Decision::Refuse;
        }
        let Some(label) = self.script.labels.find(&trigger.label) else {
            tracing::warn!(label = %trigger.label, "trigger names no label; dropped");
            return Decision::Refuse;
        };
        let running = self
            .threads
            .iter()
            .filter(|t| t.label == Some(label))
            .count();
        if running >= trigger.max_threads as usize {
            tracing::warn!(
                label = %trigger.label,
                running,
                "thread limit for this label reached; trigger dropped"
            );
            return Decision::Refuse;
        }
        if self.suspended && trigger.is_hotkey() && !self.script.is_exempt_from_suspend(label) {
            tracing::debug!(label = %trigger.label, "hotkeys suspended; trigger dropped");
            return Decision::Refuse;
        }
        if self.threads.len() >= self.config.max_threads_total {
            return Decision::Defer;
        }
        if let Some(current) = self.threads.last() {
            if !self.waiting && current.is_uninterruptible(Instant::now()) {
                return Decision::Defer;
            }
            if trigger.priority < current.priority {
                return Decision::Defer;
            }
        }
        Decision::Run(label)
    }

    /// Pushes a thread, runs it to completion and pops it. The scratch buffer
    /// and ErrorLevel are exactly as before once this returns.
    pub(crate) fn run_thread(&mut self, start: LineId, label: Option<LabelId>, trigger: &Trigger) {
        let mut ctx = ThreadContext::new(
            label,
            trigger,
            Duration::from_millis(self.interrupt_ms),
            self.interrupt_lines,
        );
        ctx.mark = Some(self.scratch.mark());
        ctx.saved_error_level = self.vars.get(self.error_level).clone();
        if trigger.is_hotkey() {
            self.prior_hotkey = std::mem::replace(&mut self.last_hotkey, trigger.name.clone());
        }
        let span = tracing::debug_span!("thread", label = %trigger.label, depth = self.threads.len());
        let _enter = span.enter();
        self.threads.push(ctx);
        // A thread started from a wait point is not itself waiting.
        let was_waiting = std::mem::replace(&mut self.waiting, false);

        let mode = match label {
            Some(_) => ExecMode::UntilReturn,
            None => ExecMode::ToEnd,
        };
        let mut result = self.exec_until(start, mode);
        while let Ok(Flow::Goto(target)) = result {
            result = self.exec_until(target, mode);
        }

        self.waiting = was_waiting;
        if let Some(ctx) = self.threads.pop() {
            let _ = self.vars.set(self.error_level, ctx.saved_error_level);
            if let Some(mark) = ctx.mark {
                self.scratch.release(mark);
            }
        }
        match result {
            Ok(Flow::ExitApp) => {
                tracing::debug!("ExitApp");
                self.terminated = true;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(at = %err.at, "{}", err.kind);
                self.errors.push(err);
            }
        }
    }

    /// Bookkeeping done before every line: history, per-thread line count,
    /// and the periodic check for pending triggers.
    pub(crate) fn tick(&mut self, id: LineId) {
        tracing::trace!(at = %self.script.describe(id), action = self.script.line(id).action.name());
        if self.recent.len() == RECENT_LINES {
            self.recent.pop_front();
        }
        self.recent.push_back(id);
        if let Some(t) = self.threads.last_mut() {
            t.lines_executed += 1;
        }
        self.batch_lines += 1;
        let by_lines = self.config.batch_lines > 0 && self.batch_lines >= self.config.batch_lines;
        let by_time = self.config.batch_ms > 0
            && self.batch_started.elapsed() >= Duration::from_millis(self.config.batch_ms);
        if by_lines || by_time {
            self.batch_lines = 0;
            self.batch_started = Instant::now();
            self.run_pending();
        }
    }

    /// An interruption point where the current thread is idle on purpose
    /// (Sleep, waiting commands): it may be interrupted even while fresh.
    pub(crate) fn wait_point(&mut self) {
        let was = std::mem::replace(&mut self.waiting, true);
        self.run_pending();
        self.waiting = was;
    }

    pub(crate) fn set_error_level(&mut self, value: impl Into<Value>) {
        let _ = self.vars.set(self.error_level, value);
    }
}
