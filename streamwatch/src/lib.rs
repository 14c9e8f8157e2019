//! # Streamwatch
//!
//! Async harness for testing interactive programs and devices.
//!
//! Streamwatch attaches to processes, TCP sockets, serial ports or `ssh`
//! sessions, reads their output line by line in background tasks, and lets
//! a test wait for a regex to show up (or a failure message to show up
//! first) while everything is echoed to one shared, colored console.
//!
//! ## Features
//!
//! - One [`Endpoint`] per stream, with `stdout`/`stderr` queues for processes
//! - `watch_for` with timeouts and fail patterns; consumed lines never replay
//! - Merged console output with per-source colors and relative timestamps
//! - Serial ports behind the `serial` cargo feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use streamwatch::{Endpoint, ProcessConfig, WatchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), streamwatch::Error> {
//!     let mut shell = Endpoint::named("shell");
//!     shell.attach_process(ProcessConfig::new("sh"))?;
//!
//!     shell.send("echo hello from $0").await?;
//!     let found = shell
//!         .watch_for_with(
//!             r"hello from (\S+)",
//!             &WatchOptions::new().fail_pattern("not found"),
//!         )
//!         .await?;
//!     println!("shell is {}", found.get(1).unwrap_or("?"));
//!
//!     shell.send("exit 0").await?;
//!     let code = shell.wait_done(Some(Duration::from_secs(5))).await?;
//!     assert_eq!(code, 0);
//!
//!     streamwatch::ConsoleSink::global().stop().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod console;
pub mod endpoint;
pub mod error;
pub mod transport;

// Re-export main types for convenience
pub use channel::{LineQueue, WatchMatch};
pub use console::{ConsoleCapture, ConsoleConfig, ConsoleSink};
pub use endpoint::{Endpoint, EndpointBuilder, QueueSelector, WatchOptions};
pub use error::{Error, Result};
pub use transport::{
    Capabilities, Connection, HostKeyVerification, InputSink, ProcessConfig, SshConfig,
};
