//! Tabs component - one scrollable pane per compose service

use crate::action::Action;
use crate::components::Component;
use crate::surface::{PaneId, UiEvent};
use chrono::{DateTime, Local};
use color_eyre::Result;
use compose_tabs_core::{PumpState, PumpSummary};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Tabs},
};
use std::collections::VecDeque;

/// Scrollback kept per pane (ring buffer)
const MAX_LINES_PER_PANE: usize = 10_000;

/// Lines moved by PageUp/PageDown when the viewport is unknown
const PAGE_SIZE: usize = 20;

/// Color palette for services (deterministic assignment)
const SERVICE_COLORS: &[Color] = &[
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::LightGreen,
    Color::LightYellow,
    Color::LightBlue,
    Color::LightMagenta,
    Color::LightCyan,
];

/// Display buffer for one service
#[derive(Debug)]
struct Pane {
    label: String,
    color: Color,
    lines: VecDeque<String>,
    /// First visible line while not following
    scroll: usize,
    /// Auto-scroll to the newest line
    following: bool,
    /// Lines received while the tab was not selected
    unread: usize,
}

impl Pane {
    fn new(label: String, color: Color) -> Self {
        Self {
            label,
            color,
            lines: VecDeque::new(),
            scroll: 0,
            following: true,
            unread: 0,
        }
    }

    fn push(&mut self, text: String) {
        self.lines.push_back(text);
        if self.lines.len() > MAX_LINES_PER_PANE {
            self.lines.pop_front();
            self.scroll = self.scroll.saturating_sub(1);
        }
    }

    fn max_scroll(&self, height: usize) -> usize {
        self.lines.len().saturating_sub(height)
    }

    /// Index of the first line shown in a viewport of `height` rows
    fn top(&self, height: usize) -> usize {
        if self.following {
            self.max_scroll(height)
        } else {
            self.scroll.min(self.max_scroll(height))
        }
    }
}

/// Tabbed per-service log view
pub struct TabsComponent {
    /// Compose project the logs are scoped to
    project: Option<String>,
    /// Command line of the log process, shown while waiting for output
    command: String,

    panes: Vec<Pane>,
    selected: usize,

    /// Pump state shown in the header
    state: PumpState,
    started_at: DateTime<Local>,
    /// Set when the stream ended without the user quitting
    ended: Option<String>,

    /// Rows available for log lines in the last draw
    viewport_height: usize,
}

impl TabsComponent {
    pub fn new(project: Option<String>, command: String) -> Self {
        Self {
            project,
            command,
            panes: Vec::new(),
            selected: 0,
            state: PumpState::Idle,
            started_at: Local::now(),
            ended: None,
            viewport_height: PAGE_SIZE,
        }
    }

    /// Apply a surface event coming from the pump
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::PaneCreated { pane, label } => self.add_pane(pane, label),
            UiEvent::Line { pane, text } => self.push_line(pane, text),
        }
    }

    fn add_pane(&mut self, pane: PaneId, label: String) {
        if pane.0 != self.panes.len() {
            tracing::warn!("Pane {} created out of order (have {})", pane.0, self.panes.len());
        }
        let color = SERVICE_COLORS[self.panes.len() % SERVICE_COLORS.len()];
        self.panes.push(Pane::new(label, color));
    }

    fn push_line(&mut self, pane: PaneId, text: String) {
        let selected = self.selected;
        match self.panes.get_mut(pane.0) {
            Some(p) => {
                p.push(text);
                if pane.0 != selected {
                    p.unread += 1;
                }
            }
            None => tracing::warn!("Line for unknown pane {}", pane.0),
        }
    }

    pub fn set_state(&mut self, state: PumpState) {
        if state == PumpState::Streaming && self.state != PumpState::Streaming {
            self.started_at = Local::now();
        }
        self.state = state;
    }

    /// Record how the stream ended. A user-requested stop is not noted.
    pub fn set_stream_ended(&mut self, summary: &PumpSummary) {
        self.state = PumpState::Stopped;
        if summary.shutdown_requested {
            return;
        }
        let exit = match summary.exit_code {
            Some(code) => format!("log command exited with code {}", code),
            None => "log command was killed".to_string(),
        };
        self.ended = Some(match (&summary.last_dropped, summary.exit_code) {
            (Some(last), code) if code != Some(0) => format!("{}: {}", exit, last),
            _ => exit,
        });
    }

    pub fn ended_note(&self) -> Option<&str> {
        self.ended.as_deref()
    }

    /// Labels in tab order
    pub fn labels(&self) -> Vec<&str> {
        self.panes.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.panes.get(self.selected).map(|p| p.label.as_str())
    }

    /// Retained lines of the pane with this label
    pub fn lines(&self, label: &str) -> Vec<&str> {
        self.panes
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.lines.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn unread(&self, label: &str) -> usize {
        self.panes
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.unread)
            .unwrap_or(0)
    }

    fn select_tab(&mut self, index: usize) {
        if let Some(pane) = self.panes.get_mut(index) {
            pane.unread = 0;
            self.selected = index;
        }
    }

    fn next_tab(&mut self) {
        if !self.panes.is_empty() {
            self.select_tab((self.selected + 1) % self.panes.len());
        }
    }

    fn prev_tab(&mut self) {
        if !self.panes.is_empty() {
            let prev = self.selected.checked_sub(1).unwrap_or(self.panes.len() - 1);
            self.select_tab(prev);
        }
    }

    fn current_pane_mut(&mut self) -> Option<&mut Pane> {
        self.panes.get_mut(self.selected)
    }

    /// Scroll up and leave follow mode
    fn scroll_up(&mut self, amount: usize) {
        let height = self.viewport_height;
        if let Some(pane) = self.current_pane_mut() {
            pane.scroll = pane.top(height).saturating_sub(amount);
            pane.following = false;
        }
    }

    /// Scroll down, re-entering follow mode at the bottom
    fn scroll_down(&mut self, amount: usize) {
        let height = self.viewport_height;
        if let Some(pane) = self.current_pane_mut() {
            let max = pane.max_scroll(height);
            pane.scroll = (pane.top(height) + amount).min(max);
            pane.following = pane.scroll >= max;
        }
    }

    fn scroll_to_top(&mut self) {
        if let Some(pane) = self.current_pane_mut() {
            pane.scroll = 0;
            pane.following = false;
        }
    }

    fn scroll_to_bottom(&mut self) {
        if let Some(pane) = self.current_pane_mut() {
            pane.following = true;
        }
    }

    fn toggle_follow(&mut self) {
        let height = self.viewport_height;
        if let Some(pane) = self.current_pane_mut() {
            if pane.following {
                pane.scroll = pane.top(height);
                pane.following = false;
            } else {
                pane.following = true;
            }
        }
    }

    fn is_following(&self) -> bool {
        self.panes.get(self.selected).is_none_or(|p| p.following)
    }

    fn status_span(&self) -> Span<'static> {
        match self.state {
            PumpState::Streaming if self.is_following() => {
                Span::styled(" ● LIVE ", Style::default().fg(Color::Green).bold())
            }
            PumpState::Streaming => Span::styled(" ○ PAUSED ", Style::default().fg(Color::DarkGray)),
            PumpState::Idle | PumpState::Started => {
                Span::styled(" ◌ STARTING ", Style::default().fg(Color::Yellow))
            }
            PumpState::Draining => Span::styled(" ◐ STOPPING ", Style::default().fg(Color::Yellow)),
            PumpState::Stopped => Span::styled(" ○ ENDED ", Style::default().fg(Color::DarkGray)),
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let project = self.project.as_deref().unwrap_or("(current directory)");
        let mut spans = vec![
            Span::raw(" Compose: ").bold().fg(Color::Cyan),
            Span::raw(project.to_string()).fg(Color::White),
            self.status_span(),
            Span::raw(format!("[{} services]", self.panes.len())).dim(),
            Span::raw(format!("  since {}", self.started_at.format("%H:%M:%S"))).dim(),
        ];

        if let Some(note) = &self.ended {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(note.clone(), Style::default().fg(Color::Red)));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(header, area);
    }

    fn draw_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = self
            .panes
            .iter()
            .map(|p| {
                let mut spans = vec![Span::styled(p.label.clone(), Style::default().fg(p.color))];
                if p.unread > 0 {
                    spans.push(Span::styled(
                        format!(" ({})", p.unread),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                Line::from(spans)
            })
            .collect();

        let tabs = Tabs::new(titles)
            .select(self.selected)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .divider(Span::raw("│").dark_gray());
        frame.render_widget(tabs, area);
    }

    fn draw_pane(&mut self, frame: &mut Frame, area: Rect) {
        let height = (area.height as usize).max(1);
        self.viewport_height = height;

        let Some(pane) = self.panes.get(self.selected) else {
            let msg = if self.state == PumpState::Stopped {
                " No service output.".to_string()
            } else {
                format!(" Waiting for output from `{}`...", self.command)
            };
            frame.render_widget(Paragraph::new(Line::from(Span::raw(msg).dim())), area);
            return;
        };

        let available = area.width.saturating_sub(2) as usize;
        let top = pane.top(height);

        let lines: Vec<Line> = pane
            .lines
            .iter()
            .skip(top)
            .take(height)
            .map(|text| {
                if text.chars().count() <= available {
                    Line::from(format!(" {}", text))
                } else {
                    let truncated: String = text.chars().take(available.saturating_sub(1)).collect();
                    Line::from(vec![Span::raw(format!(" {}", truncated)), Span::raw("…").dim()])
                }
            })
            .collect();

        frame.render_widget(Paragraph::new(lines), area);

        if pane.lines.len() > height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");
            let mut scrollbar_state = ScrollbarState::new(pane.max_scroll(height) + 1)
                .position(top)
                .viewport_content_length(height);
            frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let footer_spans = vec![
            Span::raw(" [Tab/←→]").fg(Color::Yellow),
            Span::raw(" switch").dim(),
            Span::raw("  "),
            Span::raw("[1-9]").fg(Color::Yellow),
            Span::raw(" jump").dim(),
            Span::raw("  "),
            Span::raw("[↑↓]").fg(Color::Yellow),
            Span::raw(" scroll").dim(),
            Span::raw("  "),
            Span::raw("[g/G]").fg(Color::Yellow),
            Span::raw(" top/bottom").dim(),
            Span::raw("  "),
            Span::raw("[f]").fg(Color::Yellow),
            Span::raw(" follow").dim(),
            Span::raw("  "),
            Span::raw("[q]").fg(Color::Yellow),
            Span::raw(" quit").dim(),
        ];

        let footer = Paragraph::new(Line::from(footer_spans)).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(footer, area);
    }
}

impl Component for TabsComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        match key.code {
            KeyCode::Char('q') => return Ok(Some(Action::Quit)),

            // Tabs
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.next_tab(),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.prev_tab(),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                self.select_tab(index);
            }

            // Navigation
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(self.viewport_height),
            KeyCode::PageDown => self.scroll_down(self.viewport_height),
            KeyCode::Home | KeyCode::Char('g') => self.scroll_to_top(),
            KeyCode::End | KeyCode::Char('G') => self.scroll_to_bottom(),

            // Follow mode
            KeyCode::Char('f') => self.toggle_follow(),

            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let layout = Layout::vertical([
            Constraint::Length(2), // Header
            Constraint::Length(1), // Tab bar
            Constraint::Min(0),    // Pane
            Constraint::Length(2), // Footer
        ])
        .split(area);

        self.draw_header(frame, layout[0]);
        self.draw_tab_bar(frame, layout[1]);
        self.draw_pane(frame, layout[2]);
        self.draw_footer(frame, layout[3]);

        Ok(())
    }
}
