//! Runtime configuration
//!
//! The command line only carries the project name; everything else is read
//! from `COMPOSE_TABS_*` environment variables.

use crate::pump::{DEFAULT_SHUTDOWN_GRACE, PumpOptions, UnmatchedLines};
use compose_rs::LogsCommand;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_COMMAND: &str = "COMPOSE_TABS_COMMAND";
pub const ENV_UNMATCHED: &str = "COMPOSE_TABS_UNMATCHED";
pub const ENV_SHUTDOWN_GRACE_MS: &str = "COMPOSE_TABS_SHUTDOWN_GRACE_MS";
pub const ENV_LOG_FILE: &str = "COMPOSE_TABS_LOG_FILE";

/// File name of the diagnostic log inside the temp directory
pub const DEFAULT_LOG_FILE_NAME: &str = "compose-tabs.log";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("COMPOSE_TABS_COMMAND is empty")]
    EmptyCommand,

    #[error("Invalid COMPOSE_TABS_UNMATCHED value `{0}` (expected `drop` or `continue`)")]
    InvalidUnmatched(String),

    #[error("Invalid COMPOSE_TABS_SHUTDOWN_GRACE_MS value `{0}`")]
    InvalidGrace(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project: Option<String>,
    /// Program and base args, e.g. `["docker", "compose"]`
    pub command: Vec<String>,
    pub unmatched: UnmatchedLines,
    pub shutdown_grace: Duration,
    pub log_file: PathBuf,
}

impl Config {
    /// Read settings from the process environment
    pub fn from_env(project: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(project, |key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(project: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let command = match lookup(ENV_COMMAND) {
            Some(raw) => {
                let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
                if parts.is_empty() {
                    return Err(ConfigError::EmptyCommand);
                }
                parts
            }
            None => vec!["docker".to_string(), "compose".to_string()],
        };

        let unmatched = match lookup(ENV_UNMATCHED).as_deref().map(str::trim) {
            None | Some("") => UnmatchedLines::Drop,
            Some(v) if v.eq_ignore_ascii_case("drop") => UnmatchedLines::Drop,
            Some(v) if v.eq_ignore_ascii_case("continue") => UnmatchedLines::Continuation,
            Some(v) => return Err(ConfigError::InvalidUnmatched(v.to_string())),
        };

        let shutdown_grace = match lookup(ENV_SHUTDOWN_GRACE_MS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidGrace(raw))?,
            None => DEFAULT_SHUTDOWN_GRACE,
        };

        let log_file = lookup(ENV_LOG_FILE)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_FILE_NAME));

        Ok(Self {
            project,
            command,
            unmatched,
            shutdown_grace,
            log_file,
        })
    }

    /// The log command this configuration describes
    pub fn logs_command(&self) -> LogsCommand {
        let (program, base_args) = self
            .command
            .split_first()
            .map(|(p, rest)| (p.clone(), rest.to_vec()))
            .unwrap_or_else(|| ("docker".to_string(), vec!["compose".to_string()]));
        LogsCommand::new(self.project.clone()).with_program(program, base_args)
    }

    pub fn pump_options(&self) -> PumpOptions {
        PumpOptions {
            unmatched: self.unmatched,
            shutdown_grace: self.shutdown_grace,
        }
    }
}
