#![forbid(unsafe_code)]

//! Engine tuning, loadable from TOML:
//!
//! ```toml
//! max_mem = 67108864
//! batch_lines = 0
//! batch_ms = 10
//! uninterruptible_ms = 15
//! ```

use std::path::Path;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(hotscript::config))]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Ceiling for the argument scratch buffer, in bytes.
    #[serde(default = "default_max_mem")]
    pub max_mem: usize,

    /// Poll for triggers after this many lines (0 disables the line budget).
    #[serde(default)]
    pub batch_lines: u32,

    /// Poll for triggers once this much time has passed (0 disables).
    #[serde(default = "default_batch_ms")]
    pub batch_ms: u64,

    /// A new thread cannot be interrupted until this much time has passed...
    #[serde(default = "default_uninterruptible_ms")]
    pub uninterruptible_ms: u64,

    /// ...or it has run this many lines, whichever comes first.
    #[serde(default = "default_uninterrupted_lines")]
    pub uninterrupted_lines: u64,

    /// Nesting limit for blocks, loops, gosubs and interrupting threads.
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,

    /// Maximum number of threads stacked at once.
    #[serde(default = "default_max_threads_total")]
    pub max_threads_total: usize,

    /// Trim leading/trailing blanks in `var = text`.
    #[serde(default = "default_auto_trim")]
    pub auto_trim: bool,

    #[serde(default = "default_timer_period_ms")]
    pub default_timer_period_ms: u64,
}

fn default_max_mem() -> usize {
    64 * 1024 * 1024
}

fn default_batch_ms() -> u64 {
    10
}

fn default_uninterruptible_ms() -> u64 {
    15
}

fn default_uninterrupted_lines() -> u64 {
    1000
}

fn default_max_recursion_depth() -> usize {
    1024
}

fn default_max_threads_total() -> usize {
    10
}

fn default_auto_trim() -> bool {
    true
}

fn default_timer_period_ms() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_mem: default_max_mem(),
            batch_lines: 0,
            batch_ms: default_batch_ms(),
            uninterruptible_ms: default_uninterruptible_ms(),
            uninterrupted_lines: default_uninterrupted_lines(),
            max_recursion_depth: default_max_recursion_depth(),
            max_threads_total: default_max_threads_total(),
            auto_trim: default_auto_trim(),
            default_timer_period_ms: default_timer_period_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let cfg = EngineConfig::from_toml_str("batch_lines = 5\nauto_trim = false\n").unwrap();
        assert_eq!(cfg.batch_lines, 5);
        assert!(!cfg.auto_trim);
        assert_eq!(cfg.max_mem, EngineConfig::default().max_mem);
        assert_eq!(cfg.default_timer_period_ms, 250);
    }

    #[test]
    fn rejects_wrong_types() {
        let err = EngineConfig::from_toml_str("max_mem = \"lots\"").unwrap_err();
        assert!(err.to_string().contains("invalid config"), "{err}");
    }
}
