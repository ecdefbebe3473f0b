#![allow(dead_code)]

use std::io::Write;

use hotscript_interpret::{Engine, EngineConfig, LeafContext, LeafStatus, Perform, Trigger};
use hotscript_line::{ArgKind, CommandSet, CommandSpec, Program};
use hotscript_parse::{Item, Statement, label, load};

pub fn st(keyword: &str, args: &[&str]) -> Item {
    Item::Statement(Statement::new(keyword, 0).with_args(args.iter().copied()))
}

pub fn lbl(name: &str) -> Item {
    label(name, 0)
}

pub fn commands() -> CommandSet {
    CommandSet::new()
        .with(CommandSpec::new("Echo", 0, 1))
        .with(CommandSpec::new("Fire", 1, 2))
        .with(CommandSpec::new("FileAppend", 1, 2))
        .with(CommandSpec::new("Fail", 0, 1))
        .with(CommandSpec::new("Last", 0, 0))
        .with(CommandSpec::new("SetLevel", 1, 1))
        .with(CommandSpec::new("Wait", 0, 0).waits())
        .with(CommandSpec::new("IfEven", 1, 1).args([ArgKind::InputVar]).conditional())
        .with(CommandSpec::new("StringLen", 2, 2).args([ArgKind::OutputVar, ArgKind::InputVar]))
}

/// Numbers statements by position so errors point somewhere useful.
pub fn program(items: Vec<Item>) -> Result<Program, hotscript_parse::LoadError> {
    let items = items.into_iter().enumerate().map(|(i, item)| match item {
        Item::Statement(mut s) => {
            s.line_no = i as u32 + 1;
            Item::Statement(s)
        }
        Item::Label { name, .. } => label(&name, i as u32 + 1),
    });
    load("t.hks", items, commands())
}

/// Records what the script did through its leaf commands.
#[derive(Debug, Default)]
pub struct Recorder {
    pub echoed: Vec<String>,
}

impl Perform for Recorder {
    fn perform(&mut self, spec: &CommandSpec, ctx: &mut LeafContext<'_>) -> LeafStatus {
        match spec.name.as_str() {
            "Echo" => {
                self.echoed.push(ctx.arg(0).to_string());
                LeafStatus::Ok
            }
            "Fire" => {
                let priority = ctx.arg(1).trim().parse().unwrap_or(0);
                ctx.send(Trigger::hotkey(ctx.arg(0)).priority(priority));
                LeafStatus::Ok
            }
            "FileAppend" => {
                let text = ctx.arg(0).to_string();
                let path = ctx.arg(1).to_string();
                let written = if path.is_empty() {
                    match ctx.loop_output() {
                        Ok(Some(f)) => writeln!(f, "{text}"),
                        Ok(None) => return LeafStatus::Fail("no output file".to_string()),
                        Err(e) => Err(e),
                    }
                } else {
                    std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .and_then(|mut f| writeln!(f, "{text}"))
                };
                match written {
                    Ok(()) => LeafStatus::Ok,
                    Err(e) => LeafStatus::Fail(e.to_string()),
                }
            }
            "Fail" => LeafStatus::Fail(ctx.arg(0).to_string()),
            "Last" => {
                let last = match ctx.last_result() {
                    None => "none".to_string(),
                    Some(status) => format!("{status:?}"),
                };
                self.echoed.push(last);
                LeafStatus::Ok
            }
            "SetLevel" => {
                let level = ctx.arg(0).to_string();
                ctx.set_error_level(level);
                LeafStatus::Ok
            }
            "Wait" => LeafStatus::Ok,
            "IfEven" => match ctx.arg(0).trim().parse::<i64>() {
                Ok(n) if n % 2 == 0 => LeafStatus::True,
                _ => LeafStatus::False,
            },
            "StringLen" => {
                let len = ctx.arg(1).chars().count() as i64;
                match ctx.set_output(0, len) {
                    Ok(()) => LeafStatus::Ok,
                    Err(e) => LeafStatus::Fail(e.to_string()),
                }
            }
            other => LeafStatus::Fail(format!("unknown command {other}")),
        }
    }
}

/// Interruptible right away and never polled on a timer, so tests decide
/// exactly where triggers are admitted.
pub fn config() -> EngineConfig {
    EngineConfig {
        uninterruptible_ms: 0,
        batch_ms: 0,
        ..EngineConfig::default()
    }
}

pub fn engine(items: Vec<Item>) -> Engine<Recorder> {
    engine_with(items, config())
}

pub fn engine_with(items: Vec<Item>, config: EngineConfig) -> Engine<Recorder> {
    let program = program(items).expect("program loads");
    Engine::new(program, Recorder::default(), config)
}

/// Loads and runs the auto-execute section.
pub fn run(items: Vec<Item>) -> Engine<Recorder> {
    let mut engine = engine(items);
    engine.run_auto_execute();
    engine
}

pub fn echoed(engine: &Engine<Recorder>) -> Vec<&str> {
    engine.performer().echoed.iter().map(String::as_str).collect()
}
