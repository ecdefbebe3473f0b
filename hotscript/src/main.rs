#![forbid(unsafe_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hotscript_interpret::{Admission, Engine, EngineConfig, Trigger};
use hotscript_line::Program;

mod commands;
mod program;
mod report;

use program::ProgramFile;

#[derive(Parser, Debug)]
#[command(name = "hotscript", version, about = "Runs pre-tokenized hotscript programs")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the auto-execute section, then deliver triggers and service timers
    Run {
        /// Program file (JSON)
        program: PathBuf,

        /// Engine settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Label to trigger once the auto-execute section is done (repeatable)
        #[arg(long = "trigger")]
        triggers: Vec<String>,

        /// Stop servicing timers after this many milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,

        /// Print the final variables and errors as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load a program without running it
    Check {
        program: PathBuf,

        /// Print the structured line listing
        #[arg(long, default_value_t = false)]
        list: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HOTSCRIPT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_program(path: &Path) -> miette::Result<(String, Program)> {
    let file = ProgramFile::read(path)?;
    let name = file.display_name(path);
    let program = hotscript_parse::load(&name, file.into_items(), commands::command_set())?;
    Ok((name, program))
}

fn run(
    path: &Path,
    config: Option<&Path>,
    triggers: &[String],
    timeout: Duration,
    json: bool,
) -> miette::Result<()> {
    let config = match config {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    let (name, program) = load_program(path)?;
    tracing::debug!(program = %name, lines = program.script.lines.len(), "loaded");

    let mut engine = Engine::new(program, commands::Demo::new(io::stdout()), config);
    engine.run_auto_execute();
    for label in triggers {
        if engine.is_terminated() {
            break;
        }
        match engine.dispatch(Trigger::hotkey(label.as_str())) {
            Admission::Ran => {}
            Admission::Deferred => tracing::debug!(%label, "trigger deferred"),
            Admission::Refused => tracing::warn!(%label, "trigger refused"),
        }
    }
    engine.run_pending();

    let started = Instant::now();
    while engine.has_enabled_timers() && !engine.is_terminated() {
        if started.elapsed() >= timeout {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "timers still enabled; stopping");
            break;
        }
        engine.idle(Duration::from_millis(10));
    }
    engine.exit_app();

    let errors = engine.take_errors();
    if json {
        let report = report::RunReport::new(&name, &engine, &errors);
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        for err in &errors {
            eprintln!("error: {err}");
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(miette::miette!("{} runtime error(s) in {name}", errors.len()))
    }
}

fn check(path: &Path, list: bool, json: bool) -> miette::Result<()> {
    let (name, program) = load_program(path)?;
    let script = &program.script;
    if json {
        let entries = report::listing(script);
        println!("{}", serde_json::to_string_pretty(&entries).into_diagnostic()?);
        return Ok(());
    }
    if list {
        for entry in report::listing(script) {
            println!("{}", entry.render());
        }
    }
    println!(
        "{name}: ok ({} lines, {} labels)",
        script.lines.len(),
        script.labels.len()
    );
    Ok(())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging();
    match cli.cmd {
        Cmd::Run {
            program,
            config,
            triggers,
            timeout_ms,
            json,
        } => run(
            &program,
            config.as_deref(),
            &triggers,
            Duration::from_millis(timeout_ms),
            json,
        ),
        Cmd::Check { program, list, json } => check(&program, list, json),
    }
}
