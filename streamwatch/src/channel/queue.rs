//! Background line reader feeding a private FIFO.
//!
//! A [`LineQueue`] owns its source exclusively. Its worker task reads one
//! line at a time, pushes the record onto the queue and forwards a copy to
//! the console sink, in read order. When the source hits EOF or fails, the
//! worker pushes a single sentinel record, marks the queue closed and
//! exits. Nothing but that sentinel is ever pushed after close.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::record::{Line, Record};
use crate::console::ConsoleSink;

/// Optional rewrite applied to every text line before it is queued.
///
/// Returning `None` (or an empty string) drops the line.
pub type LineTransform = Arc<dyn Fn(String) -> Option<String> + Send + Sync>;

#[derive(Debug, Default)]
struct State {
    records: VecDeque<Record>,
    closed: bool,
}

struct Shared {
    name: Arc<str>,
    state: Mutex<State>,
    changed: Notify,
    console: Option<Arc<ConsoleSink>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a record unless the queue is already closed.
    ///
    /// A sentinel closes the queue in the same critical section, so
    /// readers never observe `closed` without the sentinel being queued.
    fn push(&self, line: Line) -> bool {
        let record = Record::new(self.name.clone(), line);
        let mut state = self.lock();
        if state.closed {
            return false;
        }

        let sentinel = record.is_sentinel();
        if let Some(console) = &self.console {
            console.submit(record.clone());
        }
        state.records.push_back(record);
        if sentinel {
            state.closed = true;
        }
        drop(state);

        self.changed.notify_one();
        true
    }
}

/// Queue of lines read from one source by a dedicated worker.
pub struct LineQueue {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl LineQueue {
    /// Start reading `reader` in a background task.
    ///
    /// `name` labels the records (and the console column). Records are
    /// mirrored to `console` when one is given.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<R>(
        name: impl Into<Arc<str>>,
        reader: R,
        console: Option<Arc<ConsoleSink>>,
        transform: Option<LineTransform>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared {
            name: name.into(),
            state: Mutex::new(State::default()),
            changed: Notify::new(),
            console,
        });

        debug!("line queue '{}' opened", shared.name);
        let worker = tokio::spawn(read_lines(shared.clone(), reader, transform));

        Self { shared, worker }
    }

    /// Label of this queue's records.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Pop the oldest unread record without waiting.
    pub fn get(&self) -> Option<Record> {
        self.shared.lock().records.pop_front()
    }

    /// The source ended; only already-queued records remain.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// No unread records right now.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().records.is_empty()
    }

    /// Number of unread records.
    pub fn len(&self) -> usize {
        self.shared.lock().records.len()
    }

    /// Closed and fully drained: nothing will ever come out again.
    pub fn done(&self) -> bool {
        let state = self.shared.lock();
        state.closed && state.records.is_empty()
    }

    /// Stop the worker and close the queue.
    ///
    /// Queues the EOF sentinel unless the worker already closed the queue.
    pub fn close(&self) {
        self.worker.abort();
        if self.shared.push(Line::Eof) {
            debug!("line queue '{}' closed explicitly", self.shared.name);
        }
    }

    /// Wait until a record is pushed or the queue closes.
    ///
    /// Wake-ups are not lost: a push that happens while nobody is waiting
    /// lets the next call return immediately. Meant for a single consumer.
    pub async fn changed(&self) {
        self.shared.changed.notified().await;
    }
}

impl std::fmt::Debug for LineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("LineQueue")
            .field("name", &self.shared.name)
            .field("pending", &state.records.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Drop for LineQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Worker loop: read lines until EOF or error, then push the sentinel.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the
/// stream. Trailing whitespace (including `\r\n`) is stripped.
async fn read_lines<R>(shared: Arc<Shared>, reader: R, transform: Option<LineTransform>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf: Vec<u8> = Vec::with_capacity(1024);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                shared.push(Line::Eof);
                debug!("line queue '{}' reached EOF", shared.name);
                break;
            }
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                let text = match &transform {
                    Some(f) => f(text),
                    None => Some(text),
                };

                match text {
                    Some(text) if !text.is_empty() => {
                        trace!("{}: {}", shared.name, text);
                        if !shared.push(Line::Text(text)) {
                            break;
                        }
                    }
                    _ => trace!("{}: dropping empty line", shared.name),
                }
            }
            Err(e) => {
                debug!("line queue '{}' read error: {}", shared.name, e);
                shared.push(Line::Exception(e.to_string()));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::console::{ConsoleCapture, ConsoleConfig};

    async fn wait_closed(queue: &LineQueue) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.is_closed() {
                queue.changed().await;
            }
        })
        .await
        .expect("queue did not close");
    }

    fn drain(queue: &LineQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.get())
            .map(|r| r.text().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_lines_in_order_with_eof() {
        let queue = LineQueue::spawn("src", &b"one\r\ntwo\n\n   \nthree"[..], None, None);
        wait_closed(&queue).await;

        assert_eq!(drain(&queue), vec!["one", "two", "three", "<<EOF>>"]);
        assert!(queue.done());
        assert!(queue.get().is_none());
    }

    #[tokio::test]
    async fn test_console_sees_same_lines_in_same_order() {
        let capture = ConsoleCapture::new();
        let config = ConsoleConfig::default()
            .colorize(false)
            .writer(capture.clone());
        let sink = ConsoleSink::start(config);

        let input: String = (0..50).map(|i| format!("line {i}\n\n")).collect();
        let reader = io::Cursor::new(input.into_bytes());
        let queue = LineQueue::spawn("src", reader, Some(sink.clone()), None);
        wait_closed(&queue).await;
        sink.stop().await;

        let queued = drain(&queue);
        let printed: Vec<String> = capture
            .lines()
            .iter()
            .filter_map(|l| l.splitn(3, " | ").nth(2).map(str::to_string))
            .collect();

        assert_eq!(queued.len(), 51);
        assert_eq!(&printed[..queued.len()], &queued[..]);
    }

    #[tokio::test]
    async fn test_read_error_becomes_exception_sentinel() {
        let reader = tokio_test::io::Builder::new()
            .read(b"before\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
            .build();
        let queue = LineQueue::spawn("sock", reader, None, None);
        wait_closed(&queue).await;

        let lines = drain(&queue);
        assert_eq!(lines[0], "before");
        assert_eq!(lines[1], "<<Exception on stream: reset by peer>>");
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let queue = LineQueue::spawn("bin", &b"ok \xff\xfe end\n"[..], None, None);
        wait_closed(&queue).await;
        assert_eq!(drain(&queue)[0], "ok \u{fffd}\u{fffd} end");
    }

    #[tokio::test]
    async fn test_transform_rewrites_and_drops() {
        let transform: LineTransform = Arc::new(|line: String| {
            if line.starts_with('#') {
                None
            } else {
                Some(line.to_uppercase())
            }
        });
        let queue = LineQueue::spawn("t", &b"a\n# comment\nb\n"[..], None, Some(transform));
        wait_closed(&queue).await;
        assert_eq!(drain(&queue), vec!["A", "B", "<<EOF>>"]);
    }

    #[tokio::test]
    async fn test_explicit_close_stops_delivery() {
        let (mut writer, reader) = tokio::io::duplex(256);
        let queue = LineQueue::spawn("live", reader, None, None);

        writer.write_all(b"first\n").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.is_empty() {
                queue.changed().await;
            }
        })
        .await
        .unwrap();

        queue.close();
        queue.close();
        let _ = writer.write_all(b"second\n").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(drain(&queue), vec!["first", "<<EOF>>"]);
        assert!(queue.done());
    }
}
