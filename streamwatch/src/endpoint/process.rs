//! Exit tracking for subprocess endpoints.
//!
//! The child is moved into a dedicated task that waits on it and publishes
//! the exit code once. Termination requests are forwarded to that task,
//! since it is the only owner of the child.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};

use crate::console::ConsoleSink;
use crate::error::WatchError;

/// Exit code reported when the wait itself failed.
const WAIT_FAILED: i32 = -1;

/// Handle to a child process owned by its exit-watch task.
#[derive(Debug)]
pub struct ProcessHandle {
    name: Arc<str>,
    pid: Option<u32>,
    exit: watch::Receiver<Option<i32>>,
    terminate: mpsc::UnboundedSender<()>,
}

impl ProcessHandle {
    /// Start the exit-watch task for `child`.
    pub fn watch(name: Arc<str>, mut child: Child, console: Option<Arc<ConsoleSink>>) -> Self {
        let pid = child.id();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (term_tx, mut term_rx) = mpsc::unbounded_channel::<()>();

        let task_name = name.clone();
        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some(()) = term_rx.recv() => send_terminate(&task_name, &mut child),
                }
            };

            let code = match status {
                Ok(status) => exit_code(status),
                Err(e) => {
                    warn!("{}: waiting for process failed: {}", task_name, e);
                    WAIT_FAILED
                }
            };
            exit_tx.send_replace(Some(code));

            debug!("{} exited status {}", task_name, code);
            if let Some(console) = console {
                console.print(format!("{task_name} exited status {code}"));
            }
        });

        Self {
            name,
            pid,
            exit: exit_rx,
            terminate: term_tx,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code, once the process has exited.
    ///
    /// On unix a process killed by a signal reports the negated signal
    /// number.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.exit_code().is_none()
    }

    /// Wait for the exit code; `None` waits forever.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<i32, WatchError> {
        let mut exit = self.exit.clone();
        let waiting = async move {
            let result = exit.wait_for(Option::is_some).await.map(|code| *code);
            match result {
                Ok(code) => code,
                Err(_) => *exit.borrow(),
            }
        };

        let code = match timeout {
            Some(limit) => tokio::time::timeout(limit, waiting).await.map_err(|_| {
                WatchError::Timeout {
                    target: format!("{} to exit", self.name),
                    timeout: limit,
                }
            })?,
            None => waiting.await,
        };
        Ok(code.unwrap_or(WAIT_FAILED))
    }

    /// Ask the process to stop. A process that is already gone is not an
    /// error.
    pub fn terminate(&self) {
        if !self.is_running() {
            debug!("{}: terminate requested after exit", self.name);
            return;
        }
        if self.terminate.send(()).is_err() {
            warn!(
                "{}: process died before it could be terminated",
                self.name
            );
        }
    }
}

#[cfg(unix)]
fn send_terminate(name: &str, child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        debug!("{}: no pid left to signal", name);
        return;
    };
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => debug!("{}: sent SIGTERM to {}", name, pid),
        Err(Errno::ESRCH) => debug!("{}: process already exited", name),
        Err(e) => warn!("{}: SIGTERM to {} failed: {}", name, pid, e),
    }
}

#[cfg(not(unix))]
fn send_terminate(name: &str, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("{}: kill failed, probably died before we could kill it: {}", name, e);
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(WAIT_FAILED)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(WAIT_FAILED)
}
