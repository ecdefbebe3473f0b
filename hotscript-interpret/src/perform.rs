#![forbid(unsafe_code)]

//! The seam between the engine and leaf commands. The engine expands a
//! command line's args, hands them over through a [`LeafContext`], and acts
//! on the returned [`LeafStatus`].

use std::fs::File;
use std::io;

use hotscript_line::{CommandSpec, NameError, Value, VarId, VarTable};

use crate::expand::ExpandedArgs;
use crate::loops::LoopContext;
use crate::scratch::ScratchBuf;
use crate::thread::{Trigger, TriggerSender};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafStatus {
    Ok,
    /// Ends the current thread with a runtime error.
    Fail(String),
    /// Results of conditional commands.
    True,
    False,
}

pub trait Perform {
    fn perform(&mut self, spec: &CommandSpec, ctx: &mut LeafContext<'_>) -> LeafStatus;
}

impl<F> Perform for F
where
    F: FnMut(&CommandSpec, &mut LeafContext<'_>) -> LeafStatus,
{
    fn perform(&mut self, spec: &CommandSpec, ctx: &mut LeafContext<'_>) -> LeafStatus {
        self(spec, ctx)
    }
}

/// What a leaf command may see and touch while it runs.
pub struct LeafContext<'a> {
    pub(crate) args: &'a ExpandedArgs,
    pub(crate) scratch: &'a ScratchBuf,
    pub(crate) vars: &'a mut VarTable,
    pub(crate) error_level: VarId,
    pub(crate) loops: &'a mut [LoopContext],
    pub(crate) triggers: &'a TriggerSender,
    pub(crate) last_result: Option<LeafStatus>,
}

impl LeafContext<'_> {
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Expanded text of arg `i`; empty when absent. An input var reads as
    /// its contents, an output var as empty.
    pub fn arg(&self, i: usize) -> &str {
        self.args.text(i, self.scratch)
    }

    pub fn output_var(&self, i: usize) -> Option<VarId> {
        self.args.output(i)
    }

    /// Stores into the output var at arg `i`. A blank output arg is ignored.
    pub fn set_output(&mut self, i: usize, value: impl Into<Value>) -> Result<(), NameError> {
        match self.args.output(i) {
            Some(id) => self.vars.set(id, value),
            None => Ok(()),
        }
    }

    pub fn vars(&self) -> &VarTable {
        self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarTable {
        self.vars
    }

    pub fn set_error_level(&mut self, value: impl Into<Value>) {
        // ErrorLevel is an ordinary variable and never read-only.
        let _ = self.vars.set(self.error_level, value);
    }

    /// The output file of the innermost read loop, opened on first use.
    /// `None` when no enclosing read loop named one.
    pub fn loop_output(&mut self) -> io::Result<Option<&mut File>> {
        let enclosing = self
            .loops
            .iter_mut()
            .rev()
            .find(|l| l.kind == hotscript_line::LoopKind::ReadFile);
        match enclosing.and_then(LoopContext::output) {
            Some(out) => out.file().map(Some),
            None => Ok(None),
        }
    }

    /// Status of the previous leaf command on this thread, if it ran one.
    pub fn last_result(&self) -> Option<&LeafStatus> {
        self.last_result.as_ref()
    }

    /// Queues a new thread; it starts at the next interruption point.
    pub fn send(&self, trigger: Trigger) {
        self.triggers.send(trigger);
    }
}
