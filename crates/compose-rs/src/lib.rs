//! compose-rs: supervised `docker compose logs --follow` streams
//!
//! Builds the log command line, launches it with stdout and stderr merged,
//! frames the combined output into lines and owns process teardown.

pub mod command;
pub mod error;
pub mod framer;
pub mod process;

pub use command::LogsCommand;
pub use error::ComposeError;
pub use framer::LineFramer;
pub use process::{LogProcess, MergedOutput, ProcessState};
