//! Application state and main loop

use crate::action::Action;
use crate::components::{Component, TabsComponent};
use crate::surface::{ChannelSurface, UiEvent};
use crate::tui::{self, Tui};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use compose_tabs_core::{Config, LogPump, PumpError, PumpState, PumpSummary};
use crossterm::event::{self, Event, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Time spent applying UI events per frame before input is polled again
const DRAIN_BUDGET: Duration = Duration::from_millis(25);

/// Events applied between deadline checks
const DRAIN_BATCH: usize = 256;

type PumpTask = JoinHandle<Result<PumpSummary, PumpError>>;

/// Main application state
pub struct App {
    config: Config,
    /// Whether the application should quit
    should_quit: bool,
    tabs: TabsComponent,
    /// Input poll timeout
    tick_rate: Duration,
    /// Pane events from the pump task
    ui_rx: mpsc::UnboundedReceiver<UiEvent>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    /// Cancelled on quit or on a termination signal
    shutdown: CancellationToken,
    /// Set once the pump task has been joined
    pump_done: bool,
}

impl App {
    pub fn new(config: Config) -> Self {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let tabs = TabsComponent::new(config.project.clone(), config.logs_command().display());
        Self {
            config,
            should_quit: false,
            tabs,
            tick_rate: Duration::from_millis(50),
            ui_rx,
            ui_tx,
            shutdown: CancellationToken::new(),
            pump_done: false,
        }
    }

    /// Run the application until quit, then stop the log command
    pub async fn run(&mut self) -> Result<()> {
        // Install panic hook
        tui::install_panic_hook();

        // Before the pump exists, so a failure here leaves no child behind
        spawn_signal_listener(self.shutdown.clone())?;

        let command = self.config.logs_command();
        tracing::info!("Starting `{}`", command.display());

        let mut pump = LogPump::new(
            ChannelSurface::new(self.ui_tx.clone()),
            self.config.pump_options(),
        );
        let mut state_rx = pump.subscribe();
        let shutdown = self.shutdown.clone();
        let mut pump_task: PumpTask = tokio::spawn(async move { pump.run(&command, shutdown).await });

        // Initialize terminal
        let mut terminal = match tui::init() {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = tui::restore();
                self.stop_pump(&mut pump_task).await;
                return Err(e.into());
            }
        };

        let result = self
            .main_loop(&mut terminal, &mut pump_task, &mut state_rx)
            .await;

        // Restore terminal
        tui::restore()?;

        self.stop_pump(&mut pump_task).await;
        result
    }

    /// Main event loop
    async fn main_loop(
        &mut self,
        terminal: &mut Tui,
        pump_task: &mut PumpTask,
        state_rx: &mut watch::Receiver<PumpState>,
    ) -> Result<()> {
        loop {
            terminal.draw(|frame| {
                let area = frame.area();
                let _ = self.tabs.draw(frame, area);
            })?;

            // Don't wait for input while a backlog is queued
            let timeout = if self.ui_rx.is_empty() {
                self.tick_rate
            } else {
                Duration::ZERO
            };

            // Handle events with timeout
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = self.tabs.handle_key_event(key)? {
                            self.handle_action(action)?;
                        }
                    }
                    Event::Resize(w, h) => {
                        self.handle_action(Action::Resize(w, h))?;
                    }
                    _ => {}
                }
            } else {
                self.handle_action(Action::Tick)?;
            }

            self.drain_ui_events();
            self.tabs.set_state(*state_rx.borrow_and_update());

            if !self.pump_done && pump_task.is_finished() {
                self.pump_done = true;
                // Lines sent just before the pump returned
                self.drain_ui_events();
                let summary = join_pump(pump_task).await?;
                tracing::info!("Log stream ended (exit code {:?})", summary.exit_code);
                self.tabs.set_stream_ended(&summary);
            }

            if self.shutdown.is_cancelled() {
                self.should_quit = true;
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Apply queued pane events until the channel is empty or the frame
    /// budget is spent. Returns the number applied.
    fn drain_ui_events(&mut self) -> usize {
        let deadline = Instant::now() + DRAIN_BUDGET;
        let mut applied = 0;
        while let Ok(event) = self.ui_rx.try_recv() {
            self.tabs.apply(event);
            applied += 1;
            if applied % DRAIN_BATCH == 0 && Instant::now() >= deadline {
                tracing::trace!("UI drain budget spent, {} events still queued", self.ui_rx.len());
                break;
            }
        }
        applied
    }

    /// Handle an action
    fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                tracing::info!("Quit requested");
                self.should_quit = true;
            }
            Action::Tick => {
                if let Some(next_action) = self.tabs.update(Action::Tick)? {
                    self.handle_action(next_action)?;
                }
            }
            Action::Resize(_w, _h) => {
                // Terminal will automatically resize on next draw
            }
        }
        Ok(())
    }

    /// Cancel the pump and wait until it has reaped the log command
    async fn stop_pump(&mut self, pump_task: &mut PumpTask) {
        self.shutdown.cancel();
        if self.pump_done {
            return;
        }
        self.pump_done = true;
        match join_pump(pump_task).await {
            Ok(summary) => tracing::info!(
                "Log command stopped: {} panes, {} lines routed, {} dropped",
                summary.panes,
                summary.routed,
                summary.dropped
            ),
            Err(e) => tracing::warn!("Log pump ended with error: {}", e),
        }
    }
}

async fn join_pump(pump_task: &mut PumpTask) -> Result<PumpSummary> {
    let summary = pump_task
        .await
        .map_err(|e| eyre!("Log pump task failed: {}", e))??;
    Ok(summary)
}

/// Cancel `shutdown` on SIGINT, SIGTERM or SIGHUP
#[cfg(unix)]
fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => "SIGHUP",
        };
        tracing::info!("Received {}, shutting down", name);
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
        }
    });
    Ok(())
}
