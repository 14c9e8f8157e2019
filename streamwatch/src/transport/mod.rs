//! Connection establishment.
//!
//! Each transport produces a [`Connection`]: an optional [`InputSink`] for
//! `send`, one or two readable outputs, and for subprocesses the child
//! handle. Endpoints consume connections without knowing which transport
//! made them.

pub mod config;
pub mod process;
pub mod serial;
mod sink;
pub mod socket;

pub use config::{HostKeyVerification, ProcessConfig, SshConfig};
pub use sink::InputSink;

use tokio::io::AsyncRead;
use tokio::process::Child;

/// Boxed readable side of a stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Transports compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Serial ports (`serial` cargo feature).
    pub serial: bool,
}

impl Capabilities {
    /// Capabilities of this build, fixed at compile time.
    pub const fn detect() -> Self {
        Self {
            serial: cfg!(feature = "serial"),
        }
    }
}

/// One readable output of a connection.
pub struct OutputSource {
    /// Channel name such as `stdout`; `None` for a single combined stream.
    pub channel: Option<String>,

    pub reader: BoxedReader,
}

impl std::fmt::Debug for OutputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSource")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Everything an endpoint needs from an established stream.
#[derive(Debug, Default)]
pub struct Connection {
    /// Write side, if the stream accepts input.
    pub input: Option<InputSink>,

    /// Readable outputs, in attach order.
    pub outputs: Vec<OutputSource>,

    /// Child process behind the stream, if any.
    pub child: Option<Child>,

    /// Message printed to the console once the endpoint is attached.
    pub description: Option<String>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: InputSink) -> Self {
        self.input = Some(input);
        self
    }

    /// Add the single combined output.
    pub fn with_output(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.outputs.push(OutputSource {
            channel: None,
            reader: Box::new(reader),
        });
        self
    }

    /// Add a named output channel such as `stdout` or `stderr`.
    pub fn with_named_output(
        mut self,
        channel: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        self.outputs.push(OutputSource {
            channel: Some(channel.into()),
            reader: Box::new(reader),
        });
        self
    }

    pub fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_follow_features() {
        assert_eq!(Capabilities::detect().serial, cfg!(feature = "serial"));
    }

    #[test]
    fn test_connection_builders() {
        let (_a, b) = tokio::io::duplex(8);
        let connection = Connection::new()
            .with_named_output("stdout", b)
            .with_description("ready");
        assert_eq!(connection.outputs.len(), 1);
        assert_eq!(connection.outputs[0].channel.as_deref(), Some("stdout"));
        assert_eq!(connection.description.as_deref(), Some("ready"));
        assert!(connection.input.is_none());
        assert!(connection.child.is_none());
    }
}
