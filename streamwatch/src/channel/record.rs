//! Timestamped line records produced by line queues.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

/// Sentinel text delivered when a stream reaches end of file.
pub const EOF_MARKER: &str = "<<EOF>>";

/// Payload of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A non-empty line of text.
    Text(String),

    /// The stream ended normally.
    Eof,

    /// The stream failed; carries the error text.
    Exception(String),
}

impl Line {
    /// Text as seen by pattern search and the console.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Line::Text(s) => Cow::Borrowed(s),
            Line::Eof => Cow::Borrowed(EOF_MARKER),
            Line::Exception(e) => Cow::Owned(format!("<<Exception on stream: {e}>>")),
        }
    }

    /// Whether this is the terminal record of a stream.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Line::Text(_))
    }
}

/// One line read from a source, stamped on arrival.
#[derive(Debug, Clone)]
pub struct Record {
    /// When the line was read.
    pub timestamp: Instant,

    /// Label of the source that produced the line.
    pub source: Arc<str>,

    /// The line itself or a sentinel.
    pub line: Line,
}

impl Record {
    pub fn new(source: Arc<str>, line: Line) -> Self {
        Self {
            timestamp: Instant::now(),
            source,
            line,
        }
    }

    /// Shorthand for [`Line::as_text`].
    pub fn text(&self) -> Cow<'_, str> {
        self.line.as_text()
    }

    pub fn is_sentinel(&self) -> bool {
        self.line.is_sentinel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_text() {
        assert_eq!(Line::Eof.as_text(), "<<EOF>>");
        assert_eq!(
            Line::Exception("broken pipe".into()).as_text(),
            "<<Exception on stream: broken pipe>>"
        );
        assert!(Line::Eof.is_sentinel());
        assert!(!Line::Text("ok".into()).is_sentinel());
    }
}
