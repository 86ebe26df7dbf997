//! compose-tabs-core: log demultiplexing for compose-tabs
//!
//! Frames the combined output of the log command into
//! `(service, message)` records and routes each one to a per-service pane.

pub mod config;
pub mod parser;
pub mod pump;
pub mod registry;
pub mod types;

pub use config::{Config, ConfigError};
pub use parser::parse_frame;
pub use pump::{
    Launcher, LogPump, PumpError, PumpOptions, PumpState, PumpSummary, Supervisor, UnmatchedLines,
};
pub use registry::{PaneRegistry, PaneSurface, RouteOutcome};
pub use types::{LogLine, ServiceId};
