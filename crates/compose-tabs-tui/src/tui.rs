//! Terminal setup and teardown

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    is_raw_mode_enabled,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write, stdout};
use std::panic;

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Enter the alternate screen and raw mode
pub fn init() -> io::Result<Tui> {
    execute!(stdout(), EnterAlternateScreen)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;
    Ok(terminal)
}

/// Leave the alternate screen and raw mode. Safe to call more than once.
pub fn restore() -> io::Result<()> {
    restore_to(&mut stdout())
}

/// The alternate screen is left even when raw mode was never enabled, so a
/// half-finished `init` is undone too.
fn restore_to<W: Write>(out: &mut W) -> io::Result<()> {
    if is_raw_mode_enabled()? {
        disable_raw_mode()?;
    }
    execute!(out, LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

/// Restore the terminal before the previous panic hook prints its report
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
