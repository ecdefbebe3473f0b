#![forbid(unsafe_code)]

//! Pseudo-threads: what starts them and what each one carries while it runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use hotscript_line::{LabelId, Value};

use crate::loops::LoopContext;
use crate::perform::LeafStatus;
use crate::scratch::ScratchMark;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Hotkey,
    Hotstring,
    Timer,
    Menu,
    OnExit,
    Internal,
}

/// A request to run the routine at a label as a new thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub label: String,
    /// Shown as `A_ThisHotkey`; defaults to the label.
    pub name: String,
    pub priority: i32,
    /// How many threads of this label may run at once.
    pub max_threads: u32,
}

impl Trigger {
    pub fn new(kind: TriggerKind, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            kind,
            name: label.clone(),
            label,
            priority: 0,
            max_threads: 1,
        }
    }

    pub fn hotkey(label: impl Into<String>) -> Self {
        Self::new(TriggerKind::Hotkey, label)
    }

    pub fn timer(label: impl Into<String>, priority: i32) -> Self {
        Self::new(TriggerKind::Timer, label).priority(priority)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_threads(mut self, n: u32) -> Self {
        self.max_threads = n.max(1);
        self
    }

    pub fn is_hotkey(&self) -> bool {
        matches!(self.kind, TriggerKind::Hotkey | TriggerKind::Hotstring)
    }
}

/// FIFO of triggers waiting to be admitted. Clones share the queue, so any
/// producer (a leaf command, a host thread) can hold one.
#[derive(Clone, Debug, Default)]
pub struct TriggerSender(Arc<Mutex<VecDeque<Trigger>>>);

impl TriggerSender {
    pub fn send(&self, trigger: Trigger) {
        tracing::trace!(label = %trigger.label, kind = ?trigger.kind, "trigger queued");
        self.lock().push_back(trigger);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn front(&self) -> Option<Trigger> {
        self.lock().front().cloned()
    }

    pub(crate) fn pop_front(&self) -> Option<Trigger> {
        self.lock().pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Trigger>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State of one running thread. Threads form a stack: only the top one runs.
#[derive(Debug)]
pub struct ThreadContext {
    pub label: Option<LabelId>,
    pub label_name: String,
    pub name: String,
    pub kind: TriggerKind,
    pub priority: i32,
    pub started: Instant,
    pub lines_executed: u64,
    pub loops: Vec<LoopContext>,
    uninterruptible_for: Duration,
    uninterrupted_lines: u64,
    pub(crate) mark: Option<ScratchMark>,
    pub(crate) saved_error_level: Value,
    pub(crate) last_result: Option<LeafStatus>,
}

impl ThreadContext {
    pub(crate) fn new(
        label: Option<LabelId>,
        trigger: &Trigger,
        uninterruptible_for: Duration,
        uninterrupted_lines: u64,
    ) -> Self {
        Self {
            label,
            label_name: trigger.label.clone(),
            name: trigger.name.clone(),
            kind: trigger.kind,
            priority: trigger.priority,
            started: Instant::now(),
            lines_executed: 0,
            loops: Vec::new(),
            uninterruptible_for,
            uninterrupted_lines,
            mark: None,
            saved_error_level: Value::default(),
            last_result: None,
        }
    }

    /// A fresh thread cannot be interrupted until it has run for a while or
    /// executed enough lines, whichever happens first.
    pub fn is_uninterruptible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) < self.uninterruptible_for
            && self.lines_executed < self.uninterrupted_lines
    }
}

#[derive(Clone, Debug)]
pub struct Timer {
    pub label: LabelId,
    pub period: Duration,
    pub priority: i32,
    pub enabled: bool,
    /// Disables itself after firing once.
    pub once: bool,
    pub last_run: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct TimerTable {
    timers: Vec<Timer>,
}

impl TimerTable {
    pub fn get(&self, label: LabelId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.label == label)
    }

    /// Creates or updates the timer for `label`. A new timer without an
    /// explicit period gets `default_period`.
    pub fn set(
        &mut self,
        label: LabelId,
        enabled: bool,
        period: Option<(Duration, bool)>,
        priority: Option<i32>,
        default_period: Duration,
        now: Instant,
    ) {
        let idx = match self.timers.iter().position(|t| t.label == label) {
            Some(i) => i,
            None => {
                self.timers.push(Timer {
                    label,
                    period: default_period,
                    priority: 0,
                    enabled: false,
                    once: false,
                    last_run: now,
                });
                self.timers.len() - 1
            }
        };
        let timer = &mut self.timers[idx];
        if let Some((period, once)) = period {
            timer.period = period;
            timer.once = once;
        }
        if let Some(p) = priority {
            timer.priority = p;
        }
        if enabled && (!timer.enabled || period.is_some()) {
            timer.last_run = now;
        }
        timer.enabled = enabled;
    }

    /// Labels whose period has elapsed, with their priorities. Each one's
    /// clock restarts at `now`.
    pub fn due(&mut self, now: Instant) -> Vec<(LabelId, i32)> {
        let mut due = Vec::new();
        for timer in self.timers.iter_mut().filter(|t| t.enabled) {
            if now.saturating_duration_since(timer.last_run) >= timer.period {
                timer.last_run = now;
                if timer.once {
                    timer.enabled = false;
                }
                due.push((timer.label, timer.priority));
            }
        }
        due
    }

    pub fn any_enabled(&self) -> bool {
        self.timers.iter().any(|t| t.enabled)
    }
}
