//! Single drain pass over a line queue.
//!
//! Records are consumed as they are inspected. The pass stops at the first
//! fail-pattern or success-pattern hit and leaves anything behind it in
//! the queue for the next search.

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;

use super::queue::LineQueue;
use crate::error::WatchError;

/// A successful pattern match, detached from the queue.
#[derive(Debug, Clone)]
pub struct WatchMatch {
    /// The full line that matched.
    pub line: String,

    /// Label of the queue the line came from.
    pub source: Arc<str>,

    /// When the line was read.
    pub timestamp: Instant,

    groups: Vec<Option<Range<usize>>>,
    names: Vec<Option<String>>,
}

impl WatchMatch {
    fn new(line: String, source: Arc<str>, timestamp: Instant, pattern: &Regex) -> Option<Self> {
        let caps = pattern.captures(&line)?;
        let groups = caps.iter().map(|m| m.map(|m| m.range())).collect();
        drop(caps);

        Some(Self {
            groups,
            names: pattern.capture_names().map(|n| n.map(str::to_string)).collect(),
            line,
            source,
            timestamp,
        })
    }

    /// The text matched by the whole pattern.
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Capture group by index; 0 is the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        let range = self.groups.get(index)?.clone()?;
        self.line.get(range)
    }

    /// Capture group by name.
    pub fn name(&self, name: &str) -> Option<&str> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.get(index)
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Drain `queue` once.
///
/// For each record, every fail pattern is tried in order before the
/// success pattern. Returns `Ok(None)` if the queue ran dry with no hit and
/// is still open.
pub fn search_once(
    queue: &LineQueue,
    pattern: &Regex,
    fail_patterns: &[Regex],
) -> Result<Option<WatchMatch>, WatchError> {
    while let Some(record) = queue.get() {
        let text = record.text();
        if text.is_empty() {
            continue;
        }

        if let Some(fail) = fail_patterns.iter().find(|fp| fp.is_match(&text)) {
            return Err(WatchError::FailPatternFound {
                fail_pattern: fail.as_str().to_string(),
                line: text.into_owned(),
            });
        }

        if pattern.is_match(&text) {
            let line = text.into_owned();
            return Ok(WatchMatch::new(line, record.source, record.timestamp, pattern));
        }
    }

    if queue.done() {
        return Err(WatchError::NotFound {
            pattern: pattern.as_str().to_string(),
            queue: queue.name().to_string(),
        });
    }

    Ok(None)
}
