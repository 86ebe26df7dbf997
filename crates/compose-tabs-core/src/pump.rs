//! Log pump: subprocess output → frames → panes
//!
//! The pump owns the pane registry and is the only writer to the surface.
//! It runs as its own task next to the UI loop and stops on EOF or when the
//! shutdown token is cancelled, always reaping the child before it returns.

use crate::parser::parse_frame;
use crate::registry::{PaneRegistry, PaneSurface, RouteOutcome};
use async_trait::async_trait;
use compose_rs::{ComposeError, LineFramer, LogProcess, LogsCommand, MergedOutput};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Default time a terminated child gets before it is killed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Started,
    Streaming,
    Draining,
    Stopped,
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PumpState::Idle => "idle",
            PumpState::Started => "starting",
            PumpState::Streaming => "streaming",
            PumpState::Draining => "draining",
            PumpState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What to do with lines that are not `<service> | <message>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedLines {
    /// Discard them
    #[default]
    Drop,
    /// Append them to the pane that received the previous framed line
    Continuation,
}

#[derive(Debug, Clone)]
pub struct PumpOptions {
    pub unmatched: UnmatchedLines,
    /// How long a terminated child may take to exit before it is killed
    pub shutdown_grace: Duration,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            unmatched: UnmatchedLines::Drop,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Counters reported when the pump stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub panes: usize,
    pub routed: u64,
    pub continued: u64,
    pub dropped: u64,
    pub lossy: u64,
    /// Most recent non-blank line that was dropped, useful when the command fails
    pub last_dropped: Option<String>,
    pub exit_code: Option<i32>,
    pub shutdown_requested: bool,
}

#[derive(Error, Debug)]
pub enum PumpError {
    #[error(transparent)]
    Launch(#[from] ComposeError),

    #[error("Failed to reap log command: {0}")]
    Reap(#[source] io::Error),
}

/// Control over a running log-producing process
#[async_trait]
pub trait Supervisor: Send {
    /// Request a graceful exit. Already-exited processes are not an error.
    fn terminate(&mut self) -> Result<(), ComposeError>;

    /// Force the process to exit
    fn kill(&mut self) -> Result<(), ComposeError>;

    /// Reap the process and return its exit code (`None` if signalled).
    /// Must be cancel safe.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Starts the log-producing process
pub trait Launcher {
    type Process: Supervisor;
    type Output: AsyncRead + Unpin + Send;

    fn launch(&self) -> Result<(Self::Process, Self::Output), ComposeError>;
}

#[async_trait]
impl Supervisor for LogProcess {
    fn terminate(&mut self) -> Result<(), ComposeError> {
        LogProcess::terminate(self)
    }

    fn kill(&mut self) -> Result<(), ComposeError> {
        LogProcess::kill(self)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(LogProcess::wait(self).await?.code())
    }
}

impl Launcher for LogsCommand {
    type Process = LogProcess;
    type Output = MergedOutput;

    fn launch(&self) -> Result<(LogProcess, MergedOutput), ComposeError> {
        LogProcess::spawn(self)
    }
}

enum ReadStep {
    Shutdown,
    GraceExpired,
    Line(io::Result<Option<String>>),
}

enum ReapStep {
    Shutdown,
    GraceExpired,
    Exited(io::Result<Option<i32>>),
}

/// Drives framer, parser and registry for one subprocess lifetime
pub struct LogPump<S: PaneSurface> {
    surface: S,
    registry: PaneRegistry<S::Handle>,
    options: PumpOptions,
    state: watch::Sender<PumpState>,
    summary: PumpSummary,
}

impl<S: PaneSurface> LogPump<S> {
    pub fn new(surface: S, options: PumpOptions) -> Self {
        let (state, _) = watch::channel(PumpState::Idle);
        Self {
            surface,
            registry: PaneRegistry::new(),
            options,
            state,
            summary: PumpSummary::default(),
        }
    }

    pub fn state(&self) -> PumpState {
        *self.state.borrow()
    }

    /// Observe state transitions from another task
    pub fn subscribe(&self) -> watch::Receiver<PumpState> {
        self.state.subscribe()
    }

    pub fn registry(&self) -> &PaneRegistry<S::Handle> {
        &self.registry
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn set_state(&mut self, next: PumpState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!("Pump state: {} -> {}", prev, next);
        }
    }

    /// Launch the process and stream until EOF or shutdown, then reap it
    pub async fn run<L: Launcher>(
        &mut self,
        launcher: &L,
        shutdown: CancellationToken,
    ) -> Result<PumpSummary, PumpError> {
        self.set_state(PumpState::Started);

        let (mut process, output) = match launcher.launch() {
            Ok(launched) => launched,
            Err(e) => {
                tracing::error!("Log command failed to start: {}", e);
                self.set_state(PumpState::Stopped);
                return Err(PumpError::Launch(e));
            }
        };

        self.set_state(PumpState::Streaming);
        let mut framer = LineFramer::new(output);
        let mut kill_at: Option<Instant> = None;

        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled(), if !self.summary.shutdown_requested => ReadStep::Shutdown,
                _ = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
                    ReadStep::GraceExpired
                }
                line = framer.next_line() => ReadStep::Line(line),
            };

            match step {
                ReadStep::Shutdown => {
                    kill_at = Some(self.begin_shutdown(&mut process));
                }
                ReadStep::GraceExpired => {
                    tracing::warn!("Log output still open after grace period, killing");
                    kill_at = None;
                    Self::force_kill(&mut process);
                    break;
                }
                ReadStep::Line(Ok(Some(line))) => self.handle_line(&line),
                ReadStep::Line(Ok(None)) => break,
                ReadStep::Line(Err(e)) => {
                    tracing::warn!("Reading log output failed, treating as EOF: {}", e);
                    break;
                }
            }
        }

        if !self.summary.shutdown_requested {
            tracing::info!("Log output ended before shutdown was requested");
            self.set_state(PumpState::Draining);
        }
        self.summary.lossy = framer.lossy_lines();
        drop(framer);

        let exit_code = self.reap(&mut process, &shutdown, kill_at).await?;
        self.summary.exit_code = exit_code;
        self.summary.panes = self.registry.len();
        self.set_state(PumpState::Stopped);

        tracing::info!(
            "Log pump stopped: {} panes, {} lines routed, {} dropped, exit code {:?}",
            self.summary.panes,
            self.summary.routed,
            self.summary.dropped,
            self.summary.exit_code
        );
        Ok(self.summary.clone())
    }

    /// Wait for the child, still honoring a shutdown that arrives meanwhile
    async fn reap<P: Supervisor>(
        &mut self,
        process: &mut P,
        shutdown: &CancellationToken,
        mut kill_at: Option<Instant>,
    ) -> Result<Option<i32>, PumpError> {
        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled(), if !self.summary.shutdown_requested => ReapStep::Shutdown,
                _ = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
                    ReapStep::GraceExpired
                }
                status = process.wait() => ReapStep::Exited(status),
            };

            match step {
                ReapStep::Shutdown => {
                    kill_at = Some(self.begin_shutdown(process));
                }
                ReapStep::GraceExpired => {
                    tracing::warn!("Log command still running after grace period, killing");
                    kill_at = None;
                    Self::force_kill(process);
                }
                ReapStep::Exited(status) => return status.map_err(PumpError::Reap),
            }
        }
    }

    /// Enter draining and send the one termination request; returns the kill deadline
    fn begin_shutdown<P: Supervisor>(&mut self, process: &mut P) -> Instant {
        tracing::info!("Shutdown requested, terminating log command");
        self.summary.shutdown_requested = true;
        self.set_state(PumpState::Draining);
        if let Err(e) = process.terminate() {
            tracing::warn!("Failed to terminate log command: {}", e);
        }
        Instant::now() + self.options.shutdown_grace
    }

    fn force_kill<P: Supervisor>(process: &mut P) {
        if let Err(e) = process.kill() {
            tracing::warn!("Failed to kill log command: {}", e);
        }
    }

    fn handle_line(&mut self, line: &str) {
        if let Some(frame) = parse_frame(line) {
            if self.registry.route(&mut self.surface, frame) == RouteOutcome::Created {
                self.summary.panes = self.registry.len();
            }
            self.summary.routed += 1;
            return;
        }

        if self.options.unmatched == UnmatchedLines::Continuation
            && self.registry.route_continuation(&mut self.surface, line)
        {
            self.summary.continued += 1;
            return;
        }

        tracing::trace!("Dropped unframed line: {}", line);
        self.summary.dropped += 1;
        if !line.trim().is_empty() {
            self.summary.last_dropped = Some(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::RecordingSurface;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::oneshot;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct FakeProcess {
        calls: CallLog,
        /// Write side of the output pipe; dropping it is the fake's EOF
        writer: Option<DuplexStream>,
        close_on_terminate: bool,
        /// While set, `wait` blocks until the sender fires or is dropped
        exit_gate: Option<oneshot::Receiver<()>>,
    }

    #[async_trait]
    impl Supervisor for FakeProcess {
        fn terminate(&mut self) -> Result<(), ComposeError> {
            self.calls.lock().unwrap().push("terminate");
            if self.close_on_terminate {
                self.writer = None;
                self.exit_gate = None;
            }
            Ok(())
        }

        fn kill(&mut self) -> Result<(), ComposeError> {
            self.calls.lock().unwrap().push("kill");
            self.writer = None;
            self.exit_gate = None;
            Ok(())
        }

        async fn wait(&mut self) -> io::Result<Option<i32>> {
            if let Some(gate) = self.exit_gate.as_mut() {
                let _ = gate.await;
            }
            self.exit_gate = None;
            self.calls.lock().unwrap().push("wait");
            Ok(Some(0))
        }
    }

    struct FakeLauncher {
        launched: Mutex<Option<(FakeProcess, DuplexStream)>>,
    }

    impl Launcher for FakeLauncher {
        type Process = FakeProcess;
        type Output = DuplexStream;

        fn launch(&self) -> Result<(FakeProcess, DuplexStream), ComposeError> {
            Ok(self.launched.lock().unwrap().take().expect("launched once"))
        }
    }

    struct FailingLauncher;

    impl Launcher for FailingLauncher {
        type Process = FakeProcess;
        type Output = DuplexStream;

        fn launch(&self) -> Result<(FakeProcess, DuplexStream), ComposeError> {
            Err(ComposeError::Launch {
                command: "docker compose logs --follow".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            })
        }
    }

    /// Fake child that has already written `output`. With `keep_open` the
    /// stream stays open until the fake is terminated or killed.
    async fn fake(output: &str, keep_open: bool) -> (FakeLauncher, CallLog) {
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        writer.write_all(output.as_bytes()).await.unwrap();

        let calls = CallLog::default();
        let process = FakeProcess {
            calls: calls.clone(),
            writer: keep_open.then_some(writer),
            close_on_terminate: true,
            exit_gate: None,
        };
        let launcher = FakeLauncher {
            launched: Mutex::new(Some((process, reader))),
        };
        (launcher, calls)
    }

    fn calls(log: &CallLog) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    fn pump() -> LogPump<RecordingSurface> {
        LogPump::new(RecordingSurface::default(), PumpOptions::default())
    }

    #[tokio::test]
    async fn test_two_services_then_eof() {
        let (launcher, log) = fake("svc1 | hello\nsvc1 | world\nsvc2 | oops\n", false).await;
        let mut pump = pump();

        let summary = pump.run(&launcher, CancellationToken::new()).await.unwrap();

        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(pump.surface().creates, 2);
        assert_eq!(pump.surface().lines("svc1"), vec!["hello", "world"]);
        assert_eq!(pump.surface().lines("svc2"), vec!["oops"]);
        assert_eq!(summary.panes, 2);
        assert_eq!(summary.routed, 3);
        assert!(!summary.shutdown_requested);
        assert_eq!(calls(&log), vec!["wait"]);
    }

    #[tokio::test]
    async fn test_no_output_stops_cleanly() {
        let (launcher, log) = fake("", false).await;
        let mut pump = pump();

        let summary = pump.run(&launcher, CancellationToken::new()).await.unwrap();

        assert_eq!(pump.state(), PumpState::Stopped);
        assert!(pump.registry().is_empty());
        assert_eq!(pump.surface().creates, 0);
        assert_eq!(summary.exit_code, Some(0));
        assert_eq!(calls(&log), vec!["wait"]);
    }

    #[tokio::test]
    async fn test_unframed_lines_are_dropped() {
        let (launcher, _log) =
            fake("web | a\ngarbage no pipe\n\ndb | x\nweb | b\n", false).await;
        let mut pump = pump();

        let summary = pump.run(&launcher, CancellationToken::new()).await.unwrap();

        assert_eq!(pump.surface().lines("web"), vec!["a", "b"]);
        assert_eq!(pump.surface().lines("db"), vec!["x"]);
        assert_eq!(pump.surface().creates, 2);
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.last_dropped.as_deref(), Some("garbage no pipe"));
    }

    #[tokio::test]
    async fn test_continuation_mode_keeps_stack_traces() {
        let (launcher, _log) =
            fake("orphan\nweb | panic\n  at foo\ndb | x\n  more\n", false).await;
        let options = PumpOptions {
            unmatched: UnmatchedLines::Continuation,
            ..PumpOptions::default()
        };
        let mut pump = LogPump::new(RecordingSurface::default(), options);

        let summary = pump.run(&launcher, CancellationToken::new()).await.unwrap();

        assert_eq!(pump.surface().lines("web"), vec!["panic", "  at foo"]);
        assert_eq!(pump.surface().lines("db"), vec!["x", "  more"]);
        assert_eq!(summary.continued, 2);
        // Nothing to continue before the first pane exists
        assert_eq!(summary.dropped, 1);
    }

    #[tokio::test]
    async fn test_shutdown_terminates_once_then_reaps() {
        let (launcher, log) = fake("web | a\n", true).await;
        let mut pump = pump();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = pump.run(&launcher, shutdown).await.unwrap();

        assert_eq!(calls(&log), vec!["terminate", "wait"]);
        assert_eq!(pump.state(), PumpState::Stopped);
        assert!(summary.shutdown_requested);
        // Output already written before the quit is still delivered
        assert_eq!(pump.surface().lines("web"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_ignored_terminate_escalates_to_kill() {
        let (launcher, log) = fake("web | a\n", true).await;
        if let Some((process, _)) = launcher.launched.lock().unwrap().as_mut() {
            process.close_on_terminate = false;
        }
        let options = PumpOptions {
            shutdown_grace: Duration::from_millis(50),
            ..PumpOptions::default()
        };
        let mut pump = LogPump::new(RecordingSurface::default(), options);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        pump.run(&launcher, shutdown).await.unwrap();

        assert_eq!(calls(&log), vec!["terminate", "kill", "wait"]);
        assert_eq!(pump.state(), PumpState::Stopped);
    }

    #[tokio::test]
    async fn test_stopped_only_after_wait_returns() {
        let (launcher, log) = fake("web | a\n", false).await;
        let (release, gate) = oneshot::channel();
        if let Some((process, _)) = launcher.launched.lock().unwrap().as_mut() {
            process.exit_gate = Some(gate);
        }

        let mut pump = pump();
        let mut state = pump.subscribe();
        let task = tokio::spawn(async move {
            let result = pump.run(&launcher, CancellationToken::new()).await;
            (pump, result)
        });

        state.wait_for(|s| *s == PumpState::Draining).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(*state.borrow(), PumpState::Draining);
        assert!(!task.is_finished());
        assert!(calls(&log).is_empty());

        release.send(()).unwrap();
        let (pump, result) = task.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(calls(&log), vec!["wait"]);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_exit() {
        let (launcher, log) = fake("", false).await;
        let (_release, gate) = oneshot::channel::<()>();
        if let Some((process, _)) = launcher.launched.lock().unwrap().as_mut() {
            process.exit_gate = Some(gate);
        }

        let mut pump = pump();
        let mut state = pump.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let result = pump.run(&launcher, shutdown).await;
                (pump, result)
            }
        });

        state.wait_for(|s| *s == PumpState::Draining).await.unwrap();
        shutdown.cancel();
        let (pump, result) = task.await.unwrap();

        assert!(result.unwrap().shutdown_requested);
        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(calls(&log), vec!["terminate", "wait"]);
    }

    #[tokio::test]
    async fn test_launch_failure_stops_pump() {
        let mut pump = pump();
        let err = pump
            .run(&FailingLauncher, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PumpError::Launch(ComposeError::Launch { .. })));
        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(pump.surface().creates, 0);
    }
}
