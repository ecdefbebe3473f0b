#![forbid(unsafe_code)]

//! Runs loaded programs: argument expansion, expressions, the line walker,
//! loops and the pseudo-thread model.

mod coerce;
mod cond;
mod config;
mod engine;
mod error;
mod exec;
mod expand;
mod expr;
mod functions;
pub mod loops;
mod perform;
mod scratch;
mod thread;

pub use coerce::{parse_number, Number};
pub use config::{ConfigError, EngineConfig};
pub use engine::{Admission, Engine, RECENT_LINES};
pub use error::{ErrorKind, RuntimeError};
pub use exec::{ExecMode, Flow};
pub use expand::ExpandedArgs;
pub use perform::{LeafContext, LeafStatus, Perform};
pub use scratch::{ScratchBuf, ScratchMark};
pub use thread::{ThreadContext, Timer, TimerTable, Trigger, TriggerKind, TriggerSender};
