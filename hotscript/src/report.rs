#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use hotscript_interpret::{Engine, Perform, RuntimeError};
use hotscript_line::{Action, LineId, Script};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub at: String,
    pub message: String,
}

impl From<&RuntimeError> for ErrorEntry {
    fn from(err: &RuntimeError) -> Self {
        Self {
            at: err.at.clone(),
            message: err.kind.to_string(),
        }
    }
}

/// What `run --json` prints once the program is done.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema: &'static str,
    pub program: String,
    pub terminated: bool,
    pub errors: Vec<ErrorEntry>,
    pub vars: BTreeMap<String, String>,
}

impl RunReport {
    pub fn new<P: Perform>(program: &str, engine: &Engine<P>, errors: &[RuntimeError]) -> Self {
        let vars = engine
            .vars()
            .iter()
            .map(|(_, name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            schema: "hotscript.run/1",
            program: program.to_string(),
            terminated: engine.is_terminated(),
            errors: errors.iter().map(ErrorEntry::from).collect(),
            vars,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingEntry {
    pub id: u32,
    pub at: String,
    pub action: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<u32>,
}

/// The loaded line arena, one entry per line, with the links the preparser set.
pub fn listing(script: &Script) -> Vec<ListingEntry> {
    script
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let action = match line.action {
                Action::Command(id) => script.commands.get(id).name.clone(),
                other => other.name().to_string(),
            };
            ListingEntry {
                id: i as u32,
                at: script.describe(LineId(i as u32)),
                action,
                args: line.args.iter().map(|a| a.text.clone()).collect(),
                parent: line.parent.map(|p| p.0),
                related: line.related.map(|r| r.0),
            }
        })
        .collect()
}

impl ListingEntry {
    pub fn render(&self) -> String {
        let mut out = format!("{:>4}  {:<12} {}", self.id, self.action, self.args.join(", "));
        if let Some(parent) = self.parent {
            out.push_str(&format!("  [in {parent}]"));
        }
        if let Some(related) = self.related {
            out.push_str(&format!("  [-> {related}]"));
        }
        out
    }
}
