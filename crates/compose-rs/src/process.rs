//! Supervised log subprocess
//!
//! Launches the log command with stdout and stderr merged into a single
//! stream, and owns the terminate/kill/reap sequence.

use crate::command::LogsCommand;
use crate::error::ComposeError;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Combined stdout/stderr of the child.
///
/// On unix both descriptors of the child point at the write end of one pipe,
/// so interleaving is preserved exactly as the child emitted it.
#[cfg(unix)]
pub type MergedOutput = tokio::net::unix::pipe::Receiver;

/// Stdout of the child. Stderr is discarded on this platform.
#[cfg(not(unix))]
pub type MergedOutput = tokio::process::ChildStdout;

/// Lifecycle of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, output not yet attached to the runtime
    Starting,
    Running,
    Terminating,
    Reaped,
}

/// Handle to the running log command
#[derive(Debug)]
pub struct LogProcess {
    child: Child,
    state: ProcessState,
    status: Option<ExitStatus>,
}

impl LogProcess {
    /// Spawn the log command and return the handle plus its combined output
    pub fn spawn(command: &LogsCommand) -> Result<(Self, MergedOutput), ComposeError> {
        let command_line = command.display();
        tracing::info!("Starting log command: {}", command_line);

        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let (child, pending) = spawn_merged(cmd).map_err(|e| match e {
            ComposeError::Io(source) => ComposeError::Launch {
                command: command_line,
                source,
            },
            other => other,
        })?;

        // Dropping the handle on failure below kills the child
        let mut process = Self {
            child,
            state: ProcessState::Starting,
            status: None,
        };
        let output = attach_output(pending)?;
        process.state = ProcessState::Running;

        tracing::debug!("Log command running with pid {:?}", process.id());
        Ok((process, output))
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process id, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Ask the process to exit gracefully (SIGTERM on unix).
    ///
    /// A process that has already exited is not an error.
    pub fn terminate(&mut self) -> Result<(), ComposeError> {
        if self.state == ProcessState::Reaped {
            tracing::debug!("terminate: process already reaped");
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        self.state = ProcessState::Terminating;

        #[cfg(unix)]
        {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => {
                    tracing::info!("Sent SIGTERM to log command (pid {})", pid);
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    tracing::debug!("terminate: pid {} already gone", pid);
                    Ok(())
                }
                Err(e) => Err(ComposeError::Signal(e)),
            }
        }

        #[cfg(not(unix))]
        {
            tracing::info!("Terminating log command (pid {})", pid);
            self.kill()
        }
    }

    /// Force the process to exit (SIGKILL on unix)
    pub fn kill(&mut self) -> Result<(), ComposeError> {
        if self.state == ProcessState::Reaped {
            return Ok(());
        }
        self.state = ProcessState::Terminating;
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // tokio reports InvalidInput for a child that has already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ComposeError::Io(e)),
        }
    }

    /// Reap the process. Repeated calls return the recorded status.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.status = Some(status);
        self.state = ProcessState::Reaped;
        tracing::info!("Log command exited: {}", status);
        Ok(status)
    }
}

#[cfg(unix)]
fn spawn_merged(mut cmd: Command) -> Result<(Child, io::PipeReader), ComposeError> {
    let (reader, writer) = io::pipe()?;
    cmd.stdout(writer.try_clone()?).stderr(writer);

    let child = cmd.spawn()?;
    // The command still holds our copies of the write end; EOF only arrives
    // once every copy is closed.
    drop(cmd);

    Ok((child, reader))
}

/// Register the read end with the runtime
#[cfg(unix)]
fn attach_output(reader: io::PipeReader) -> Result<MergedOutput, ComposeError> {
    use std::os::fd::OwnedFd;

    let output = tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(output)
}

#[cfg(not(unix))]
fn spawn_merged(mut cmd: Command) -> Result<(Child, MergedOutput), ComposeError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::null());
    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take().ok_or(ComposeError::MissingOutput)?;
    Ok((child, stdout))
}

#[cfg(not(unix))]
fn attach_output(stdout: MergedOutput) -> Result<MergedOutput, ComposeError> {
    Ok(stdout)
}
