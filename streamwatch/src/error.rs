//! Error types for streamwatch.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for streamwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pattern search errors
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Endpoint usage errors
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// Connection establishment errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// True if a deadline expired without a definitive result.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Watch(WatchError::Timeout { .. }))
    }

    /// True if the watched stream closed before the pattern appeared.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Watch(WatchError::NotFound { .. }))
    }

    /// True if a fail pattern was seen before the success pattern.
    pub fn is_fail_pattern(&self) -> bool {
        matches!(self, Error::Watch(WatchError::FailPatternFound { .. }))
    }
}

/// Errors raised by `watch_for` and `wait_done`.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Deadline passed before the pattern (or process exit) was seen
    #[error("Timed out after {timeout:?} waiting for {target}")]
    Timeout { target: String, timeout: Duration },

    /// The stream closed for good and the pattern never appeared
    #[error("Stream '{queue}' closed while looking for {pattern:?}")]
    NotFound { pattern: String, queue: String },

    /// An undesired pattern showed up first
    #[error("Fail pattern {fail_pattern:?} found in line {line:?}")]
    FailPatternFound { fail_pattern: String, line: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// No queue by that name on this endpoint
    #[error("Queue '{name}' not found")]
    QueueNotFound { name: String },
}

/// Endpoint lifecycle and usage errors.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The endpoint already has a stream bound to it
    #[error("Endpoint '{name}' is already attached to a stream")]
    AlreadyAttached { name: String },

    /// Operation requires an attached stream
    #[error("Endpoint '{name}' has no attached stream")]
    NotAttached { name: String },

    /// The endpoint is read-only or its input was closed
    #[error("Endpoint '{name}' has no input sink")]
    NoInputSink { name: String },

    /// Operation is only meaningful for subprocess endpoints
    #[error("Endpoint '{name}' is not backed by a process")]
    NoProcess { name: String },

    /// Value could not be serialized for the JSON send form
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection establishment errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to start the child process
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Failed to open a serial device
    #[error("Failed to open serial port {path}: {message}")]
    SerialOpen { path: String, message: String },

    /// Support for this transport was not compiled in
    #[error("{capability} support is not available in this build")]
    Unsupported { capability: &'static str },
}

/// Result type alias using streamwatch's Error.
pub type Result<T> = std::result::Result<T, Error>;
