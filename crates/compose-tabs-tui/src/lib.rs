//! compose-tabs-tui: Terminal UI for compose-tabs
//!
//! A Ratatui-based TUI using the Component pattern. The log pump runs as a
//! separate task and hands panes and lines to the render loop over a channel.

pub mod action;
pub mod app;
pub mod components;
pub mod surface;
pub mod tui;

pub use app::App;
