//! UI components

mod tabs;

pub use tabs::TabsComponent;

use crate::action::Action;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

/// A self-contained piece of UI: reacts to keys and actions, draws itself
pub trait Component {
    /// Handle a key press, optionally producing an action for the app
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>>;

    /// React to an app-level action
    fn update(&mut self, action: Action) -> Result<Option<Action>>;

    /// Render into `area`
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}
