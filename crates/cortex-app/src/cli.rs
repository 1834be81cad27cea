//! CLI argument definitions for the `cortex` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use cortex_core::types::{SessionContext, Shift};
use std::path::PathBuf;

/// Cortex: turns clinician commands into confirmable record actions.
#[derive(Parser, Debug)]
#[command(name = "cortex", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Patient currently open in the record.
    #[arg(long = "patient", global = true)]
    pub patient: Option<String>,

    /// Current shift: early/vroeg, late/laat, night/nacht.
    #[arg(long = "shift", global = true)]
    pub shift: Option<Shift>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run only the local classifier and print its result.
    Classify {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Classify and, when needed, resolve through the language model.
    Resolve {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive session: type commands, confirm actions, see nudges.
    Repl,
    /// List the protocol rules.
    Rules,
}

impl Command {
    /// The utterance of `classify`/`resolve`, words joined by spaces.
    pub fn utterance(&self) -> Option<String> {
        match self {
            Command::Classify { text } | Command::Resolve { text } => Some(text.join(" ")),
            Command::Repl | Command::Rules => None,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CORTEX_CONFIG env var > ~/.cortex/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CORTEX_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        config_level.to_string()
    }

    /// Session context from the --patient and --shift flags.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            active_patient: self.patient.clone(),
            shift: self.shift,
            recent_utterances: Vec::new(),
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".cortex").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cortex").join("config.toml");
    }
    PathBuf::from("config.toml")
}
