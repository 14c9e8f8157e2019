//! Options for `watch_for`.

use std::time::Duration;

/// Which of an endpoint's queues to search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueueSelector {
    /// The only queue, or `stdout` when there are two.
    #[default]
    Default,

    Stdout,

    Stderr,

    /// A queue by its name.
    Named(String),
}

/// Search parameters for [`Endpoint::watch_for_with`](super::Endpoint::watch_for_with).
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Queue to search.
    pub queue: QueueSelector,

    /// Give up after this long.
    pub timeout: Duration,

    /// Longest pause between drain passes while the queue is quiet.
    pub poll_interval: Duration,

    /// Patterns that fail the search if they match before the target does.
    pub fail_patterns: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            queue: QueueSelector::Default,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            fail_patterns: Vec::new(),
        }
    }
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the queue to search (default: the only one, or `stdout`).
    pub fn queue(mut self, queue: QueueSelector) -> Self {
        self.queue = queue;
        self
    }

    /// Search the `stderr` queue.
    pub fn stderr(self) -> Self {
        self.queue(QueueSelector::Stderr)
    }

    /// Set the search timeout (default: 5s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the longest pause between drain passes (default: 10ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Add one fail pattern.
    pub fn fail_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.fail_patterns.push(pattern.into());
        self
    }

    /// Add several fail patterns, checked in the order given.
    pub fn fail_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }
}
