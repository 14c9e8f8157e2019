//! Test-facing endpoints.
//!
//! An [`Endpoint`] binds one attached stream (process, socket, serial port,
//! or any [`Connection`]) to a name, and exposes the operations test code
//! calls: [`send`](Endpoint::send), [`watch_for`](Endpoint::watch_for),
//! [`wait_done`](Endpoint::wait_done) and friends.

mod builder;
mod options;
mod process;

pub use builder::EndpointBuilder;
pub use options::{QueueSelector, WatchOptions};
pub use process::ProcessHandle;

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;

use crate::channel::{LineQueue, LineTransform, WatchMatch, search_once};
use crate::console::ConsoleSink;
use crate::error::{EndpointError, Result, TransportError, WatchError};
use crate::transport::{self, Capabilities, Connection, InputSink, ProcessConfig, SshConfig};

/// Terminator appended to text sends.
const LINE_ENDING: &str = "\r\n";

/// A named handle on one interactive stream.
///
/// An endpoint is attached at most once. Process and SSH endpoints have
/// `stdout` and `stderr` queues; every other transport has a single queue
/// named after the endpoint.
pub struct Endpoint {
    name: Arc<str>,
    console: Option<Arc<ConsoleSink>>,
    transform: Option<LineTransform>,
    queues: IndexMap<String, LineQueue>,
    input: Option<InputSink>,
    process: Option<ProcessHandle>,
    attached: bool,
}

impl Endpoint {
    pub(crate) fn new(
        name: Arc<str>,
        console: Option<Arc<ConsoleSink>>,
        transform: Option<LineTransform>,
    ) -> Self {
        Self {
            name,
            console,
            transform,
            queues: IndexMap::new(),
            input: None,
            process: None,
            attached: false,
        }
    }

    /// Shorthand for `EndpointBuilder::new().name(name).build()`.
    pub fn named(name: impl Into<String>) -> Self {
        EndpointBuilder::new().name(name).build()
    }

    /// Endpoint name, used as the console label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a stream has been bound.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Names of the attached queues, in attach order.
    pub fn queue_names(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Queue by name: `stdout`, `stderr`, or the endpoint name.
    pub fn queue(&self, name: &str) -> Option<&LineQueue> {
        self.queues.get(name)
    }

    /// Bind an established connection to this endpoint.
    ///
    /// Starts one line queue per output and, if the connection carries a
    /// child process, its exit-watch task.
    pub fn attach(&mut self, connection: Connection) -> Result<&mut Self> {
        self.ensure_detached()?;

        for output in connection.outputs {
            let (key, label) = match output.channel {
                Some(channel) => {
                    let label = format!("{}:{}", self.name, channel);
                    (channel, label)
                }
                None => (self.name.to_string(), self.name.to_string()),
            };
            let queue = LineQueue::spawn(
                label,
                output.reader,
                self.console.clone(),
                self.transform.clone(),
            );
            self.queues.insert(key, queue);
        }

        self.input = connection.input;
        if let Some(child) = connection.child {
            self.process = Some(ProcessHandle::watch(
                self.name.clone(),
                child,
                self.console.clone(),
            ));
        }
        self.attached = true;
        debug!(
            "{}: attached with queues {:?}",
            self.name,
            self.queues.keys().collect::<Vec<_>>()
        );

        if let Some(description) = connection.description {
            self.note(description);
        }
        Ok(self)
    }

    /// Spawn a subprocess and attach its stdio.
    pub fn attach_process(&mut self, config: ProcessConfig) -> Result<&mut Self> {
        self.ensure_detached()?;
        let connection = transport::process::spawn(&config)?;
        self.attach(connection)
    }

    /// Connect to a TCP server and attach the socket.
    pub async fn attach_socket(&mut self, host: &str, port: u16) -> Result<&mut Self> {
        self.ensure_detached()?;
        let connection = transport::socket::connect(host, port).await?;
        self.attach(connection)
    }

    /// Open a serial port and attach it.
    ///
    /// Fails with [`TransportError::Unsupported`](crate::error::TransportError::Unsupported)
    /// unless the crate was built with the `serial` feature.
    pub fn attach_serial(&mut self, path: &str, baud: u32) -> Result<&mut Self> {
        self.ensure_detached()?;
        if !Capabilities::detect().serial {
            self.note("Error: serial support is not available in this build");
            return Err(TransportError::Unsupported {
                capability: "serial",
            }
            .into());
        }
        let connection = transport::serial::open(path, baud)?;
        self.attach(connection)
    }

    /// Run `ssh` as a subprocess and attach it.
    pub fn attach_ssh(&mut self, config: &SshConfig) -> Result<&mut Self> {
        self.attach_process(config.to_process_config())
    }

    fn ensure_detached(&self) -> Result<()> {
        if self.attached {
            self.note("Error: this endpoint can only do one stream at a time");
            return Err(EndpointError::AlreadyAttached {
                name: self.name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Send one line of text, terminated with CRLF.
    pub async fn send(&mut self, text: impl Display) -> Result<()> {
        self.send_parts([text]).await
    }

    /// Send several pieces as one line.
    ///
    /// Each piece is trimmed, then the pieces are joined with single
    /// spaces and CRLF is appended.
    pub async fn send_parts<I>(&mut self, parts: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let message = encode_text(parts);
        self.write(message.as_bytes()).await
    }

    /// Send bytes exactly as given.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.write(data).await
    }

    /// Send `value` as a line of JSON.
    pub async fn send_json<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let mut message = serde_json::to_string(value).map_err(EndpointError::from)?;
        message.push('\n');
        self.write(message.as_bytes()).await
    }

    /// Write to the input sink. I/O failures are logged, not returned:
    /// the peer is usually on its way out.
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(input) = self.input.as_mut() else {
            self.note("Error: nothing to send to");
            return Err(EndpointError::NoInputSink {
                name: self.name.to_string(),
            }
            .into());
        };

        if let Err(e) = input.write(data).await {
            warn!("{}: send failed: {}", self.name, e);
            self.note(format!("send failed: {e}"));
        }
        Ok(())
    }

    /// Wait for a line matching `pattern` with default options.
    pub async fn watch_for(&self, pattern: &str) -> Result<WatchMatch> {
        self.watch_for_with(pattern, &WatchOptions::default()).await
    }

    /// Wait for a line matching `pattern`.
    ///
    /// Lines are consumed as they are checked, whether or not they match.
    /// Each line is tested against every fail pattern before `pattern`.
    /// The search stops at the first hit of either kind and leaves later
    /// lines queued for the next call.
    ///
    /// Errors: [`WatchError::FailPatternFound`] on a fail-pattern hit,
    /// [`WatchError::NotFound`] as soon as the queue is closed and drained,
    /// [`WatchError::Timeout`] when `options.timeout` runs out.
    pub async fn watch_for_with(
        &self,
        pattern: &str,
        options: &WatchOptions,
    ) -> Result<WatchMatch> {
        let queue = self.resolve_queue(&options.queue)?;
        let target = Regex::new(pattern).map_err(WatchError::from)?;
        let fail_patterns = options
            .fail_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(WatchError::from)?;

        let deadline = Instant::now() + options.timeout;
        loop {
            if let Some(found) = search_once(queue, &target, &fail_patterns)? {
                debug!("{}: matched {:?} in {:?}", self.name, pattern, found.line);
                return Ok(found);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WatchError::Timeout {
                    target: format!("{pattern:?}"),
                    timeout: options.timeout,
                }
                .into());
            }

            let wake = deadline.min(now + options.poll_interval);
            let _ = tokio::time::timeout_at(wake, queue.changed()).await;
        }
    }

    fn resolve_queue(&self, selector: &QueueSelector) -> Result<&LineQueue> {
        if !self.attached {
            return Err(EndpointError::NotAttached {
                name: self.name.to_string(),
            }
            .into());
        }

        let key = match selector {
            QueueSelector::Default if self.queues.len() == 1 => {
                self.queues.keys().next().map(String::as_str).unwrap_or("stdout")
            }
            QueueSelector::Default | QueueSelector::Stdout => "stdout",
            QueueSelector::Stderr => "stderr",
            QueueSelector::Named(name) => name.as_str(),
        };

        self.queues.get(key).ok_or_else(|| {
            self.note(format!("Queue {key} not found"));
            WatchError::QueueNotFound {
                name: key.to_string(),
            }
            .into()
        })
    }

    /// Wait for the subprocess to exit and return its exit code.
    ///
    /// `None` waits without limit.
    pub async fn wait_done(&self, timeout: Option<Duration>) -> Result<i32> {
        let process = self.process()?;
        Ok(process.wait(timeout).await?)
    }

    /// Whether the subprocess is still running; `false` for other transports.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(ProcessHandle::is_running)
    }

    /// Exit code of the subprocess, once it has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.process.as_ref().and_then(ProcessHandle::exit_code)
    }

    /// OS process id of the subprocess.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ProcessHandle::pid)
    }

    /// Ask a running subprocess to stop. Best effort; does nothing for
    /// other transports or a process that already exited.
    pub fn terminate(&self) {
        if let Some(process) = &self.process {
            process.terminate();
        }
    }

    /// Close every queue and drop the input sink.
    ///
    /// The endpoint stays attached; searches now end in `NotFound` once the
    /// remaining lines are consumed.
    pub fn close(&mut self) {
        for queue in self.queues.values() {
            queue.close();
        }
        self.input = None;
    }

    fn process(&self) -> Result<&ProcessHandle> {
        self.process.as_ref().ok_or_else(|| {
            EndpointError::NoProcess {
                name: self.name.to_string(),
            }
            .into()
        })
    }

    /// Diagnostic line on the console, tagged with the endpoint name.
    fn note(&self, message: impl Display) {
        debug!("{}: {}", self.name, message);
        if let Some(console) = &self.console {
            console.print(format!("{}: {}", self.name, message));
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("queues", &self.queues)
            .field("input", &self.input)
            .field("process", &self.process)
            .finish()
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("{}: dropped while its process still runs, terminating", self.name);
            self.terminate();
        }
    }
}

/// Trim each piece, join with spaces, append CRLF.
fn encode_text<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut message = parts
        .into_iter()
        .map(|part| part.to_string().trim().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    message.push_str(LINE_ENDING);
    message
}
