#![forbid(unsafe_code)]

//! The small leaf command set the command-line runner ships with.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use hotscript_interpret::{LeafContext, LeafStatus, Perform, Trigger};
use hotscript_line::{ArgKind, CommandSet, CommandSpec};

pub fn command_set() -> CommandSet {
    CommandSet::new()
        .with(CommandSpec::new("Echo", 0, 1))
        .with(CommandSpec::new("FileAppend", 1, 2))
        .with(CommandSpec::new("IfExist", 1, 1).conditional())
        .with(CommandSpec::new("IfNotExist", 1, 1).conditional())
        .with(CommandSpec::new("StringLen", 2, 2).args([ArgKind::OutputVar, ArgKind::InputVar]))
        .with(CommandSpec::new("Fire", 1, 2))
        .with(CommandSpec::new("Wait", 0, 1).waits())
}

/// Performs the demo commands, writing `Echo` output to `out`.
pub struct Demo<W: Write> {
    out: W,
}

impl<W: Write> Demo<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn echo(&mut self, text: &str) -> LeafStatus {
        match writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            Ok(()) => LeafStatus::Ok,
            Err(e) => LeafStatus::Fail(e.to_string()),
        }
    }
}

/// `FileAppend, text, path`: appends a line to `path`, or to the enclosing
/// read-file loop's output file when `path` is blank.
fn file_append(ctx: &mut LeafContext<'_>) -> io::Result<LeafStatus> {
    let text = ctx.arg(0).to_string();
    let path = ctx.arg(1).trim().to_string();
    if path.is_empty() {
        return match ctx.loop_output()? {
            Some(file) => {
                writeln!(file, "{text}")?;
                Ok(LeafStatus::Ok)
            }
            None => Ok(LeafStatus::Fail(
                "no file named and no read-file loop to append to".to_string(),
            )),
        };
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{text}")?;
    Ok(LeafStatus::Ok)
}

impl<W: Write> Perform for Demo<W> {
    fn perform(&mut self, spec: &CommandSpec, ctx: &mut LeafContext<'_>) -> LeafStatus {
        match spec.name.as_str() {
            "Echo" => self.echo(ctx.arg(0)),
            "FileAppend" => match file_append(ctx) {
                Ok(status) => {
                    ctx.set_error_level(i64::from(status != LeafStatus::Ok));
                    status
                }
                Err(e) => {
                    ctx.set_error_level(1);
                    LeafStatus::Fail(e.to_string())
                }
            },
            "IfExist" | "IfNotExist" => {
                let exists = Path::new(ctx.arg(0).trim()).exists();
                if exists == (spec.name == "IfExist") {
                    LeafStatus::True
                } else {
                    LeafStatus::False
                }
            }
            "StringLen" => {
                let len = ctx.arg(1).chars().count() as i64;
                match ctx.set_output(0, len) {
                    Ok(()) => LeafStatus::Ok,
                    Err(e) => LeafStatus::Fail(e.to_string()),
                }
            }
            "Fire" => {
                let priority = match ctx.arg(1).trim() {
                    "" => 0,
                    p => match p.parse() {
                        Ok(n) => n,
                        Err(_) => return LeafStatus::Fail(format!("invalid priority \"{p}\"")),
                    },
                };
                ctx.send(Trigger::hotkey(ctx.arg(0).trim()).priority(priority));
                LeafStatus::Ok
            }
            "Wait" => {
                let ms = ctx.arg(0).trim().parse::<u64>().unwrap_or(0);
                std::thread::sleep(Duration::from_millis(ms));
                LeafStatus::Ok
            }
            other => LeafStatus::Fail(format!("{other} is not supported here")),
        }
    }
}
