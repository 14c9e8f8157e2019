//! Ordered console printer shared by every endpoint.
//!
//! Line queues forward a copy of each record here. A single printer thread
//! prints them in arrival order, one line per record:
//!
//! ```text
//!    0.153 |     proc:stdout | i 1
//!    0.154 |                 | i 2
//!    0.201 |          s_sock | You said: hello
//! ```
//!
//! The name column is left blank when a record comes from the same source
//! as the line above it.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{debug, trace, warn};

use super::palette::{self, ColorAllocator, ColorSpec};
use crate::channel::{Line, Record};

/// Source label used for the sink's own messages.
pub const CONSOLE_LABEL: &str = "console";

/// Width of the source-name column.
pub const NAME_WIDTH: usize = 17;

static GLOBAL: OnceLock<Arc<ConsoleSink>> = OnceLock::new();

/// Where printed lines go.
pub enum ConsoleOutput {
    /// Process stdout.
    Stdout,

    /// Any writer, e.g. a [`ConsoleCapture`] in tests.
    Writer(Box<dyn Write + Send>),
}

impl std::fmt::Debug for ConsoleOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleOutput::Stdout => f.write_str("Stdout"),
            ConsoleOutput::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Configuration for a [`ConsoleSink`].
#[derive(Debug)]
pub struct ConsoleConfig {
    /// Wrap lines in per-source color escapes.
    pub colorize: bool,

    /// Output target.
    pub output: ConsoleOutput,

    /// Longest single wait of the printer thread on its inbox.
    pub recv_timeout: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            colorize: palette::should_color(),
            output: ConsoleOutput::Stdout,
            recv_timeout: Duration::from_secs(1),
        }
    }
}

impl ConsoleConfig {
    /// Force coloring on or off.
    pub fn colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    /// Print into `writer` instead of stdout.
    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.output = ConsoleOutput::Writer(Box::new(writer));
        self
    }
}

/// Cloneable in-memory writer for capturing console output.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl ConsoleCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for ConsoleCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Format one console line: relative seconds, source name, text.
///
/// Names longer than [`NAME_WIDTH`] are cut so the columns stay aligned.
pub fn format_line(relative: Duration, name: &str, line: &str) -> String {
    let name: String = name.chars().take(NAME_WIDTH).collect();
    format!(
        "{:8.3} | {:>width$} | {}",
        relative.as_secs_f64(),
        name,
        line,
        width = NAME_WIDTH
    )
}

/// Messages from sink handles to the printer thread.
enum Message {
    Print(Record),
    Stop,
}

/// Process-wide ordered printer.
///
/// Construct with [`ConsoleSink::start`] and hand the `Arc` to every
/// endpoint that should print through it. Call [`stop`](Self::stop) before
/// exiting so the backlog gets flushed.
///
/// The printer runs on its own thread, so a sink outlives the runtime that
/// created it.
pub struct ConsoleSink {
    /// `None` once stopped. Checking and sending under this lock keeps
    /// every accepted record ahead of the stop message.
    tx: Mutex<Option<mpsc::Sender<Message>>>,
    start_time: Instant,
    colors: Arc<Mutex<IndexMap<String, ColorSpec>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    send_failed: AtomicBool,
    label: Arc<str>,
}

impl ConsoleSink {
    /// Start a sink and its printer thread.
    ///
    /// If the thread cannot be spawned the sink is returned already
    /// stopped and drops everything submitted to it.
    pub fn start(config: ConsoleConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        let start_time = Instant::now();
        let colors = Arc::new(Mutex::new(IndexMap::new()));
        let colorize = config.colorize;

        let printer = Printer {
            rx,
            start_time,
            colors: colors.clone(),
            allocator: ColorAllocator::new(),
            colorize,
            output: config.output,
            recv_timeout: config.recv_timeout,
            last_source: None,
        };
        let worker = thread::Builder::new()
            .name("streamwatch-console".into())
            .spawn(move || printer.run());

        let (tx, worker) = match worker {
            Ok(worker) => {
                debug!("console sink started (colorize={})", colorize);
                (Some(tx), Some(worker))
            }
            Err(e) => {
                warn!("console sink could not start its printer thread: {}", e);
                (None, None)
            }
        };

        Arc::new(Self {
            tx: Mutex::new(tx),
            start_time,
            colors,
            worker: Mutex::new(worker),
            send_failed: AtomicBool::new(false),
            label: Arc::from(CONSOLE_LABEL),
        })
    }

    /// Shared default sink, started with [`ConsoleConfig::default`] on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| Self::start(ConsoleConfig::default()))
            .clone()
    }

    /// Queue a record for printing.
    ///
    /// Returns `false` if the record was dropped because the sink is
    /// stopped.
    pub fn submit(&self, record: Record) -> bool {
        let mut tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = tx.as_ref() else {
            debug!("console sink stopped, dropping line from {}", record.source);
            return false;
        };

        if sender.send(Message::Print(record)).is_err() {
            if !self.send_failed.swap(true, Ordering::Relaxed) {
                warn!("console printer thread is gone, console output is lost");
            }
            *tx = None;
            return false;
        }
        true
    }

    /// Print a diagnostic line under the sink's own label.
    pub fn print(&self, message: impl Into<String>) {
        self.submit(Record::new(self.label.clone(), Line::Text(message.into())));
    }

    /// Stop the printer after it has printed everything already queued.
    ///
    /// Records submitted after this call are dropped.
    pub async fn stop(&self) {
        let sender = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            let stopping = Record::new(self.label.clone(), Line::Text("stopping".into()));
            let _ = sender.send(Message::Print(stopping));
            let _ = sender.send(Message::Stop);
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => debug!("console sink stopped"),
                Ok(Err(_)) => warn!("console printer thread panicked"),
                Err(e) => warn!("waiting for the console printer failed: {}", e),
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Epoch that printed timestamps are relative to.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Color assigned to a source, if it has printed anything yet.
    pub fn color_for(&self, source: &str) -> Option<ColorSpec> {
        self.colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
    }

    /// Source names in the order they were first printed.
    pub fn sources(&self) -> Vec<String> {
        self.colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// State owned by the printer thread.
struct Printer {
    rx: mpsc::Receiver<Message>,
    start_time: Instant,
    colors: Arc<Mutex<IndexMap<String, ColorSpec>>>,
    allocator: ColorAllocator,
    colorize: bool,
    output: ConsoleOutput,
    recv_timeout: Duration,
    last_source: Option<Arc<str>>,
}

impl Printer {
    /// Print until a stop message arrives or every sender is gone.
    fn run(mut self) {
        loop {
            match self.rx.recv_timeout(self.recv_timeout) {
                Ok(Message::Print(record)) => self.emit(record),
                Ok(Message::Stop) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn emit(&mut self, record: Record) {
        let relative = record.timestamp.saturating_duration_since(self.start_time);
        let spec = self.color_of(&record.source);

        let repeated = self.last_source.as_deref() == Some(&*record.source);
        let name = if repeated { "" } else { &*record.source };
        let text = format_line(relative, name, &record.text());
        trace!("console: {}", text);

        let text = if self.colorize {
            palette::colorize(&text, &spec)
        } else {
            text
        };

        let result = match &mut self.output {
            ConsoleOutput::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{text}").and_then(|_| out.flush())
            }
            ConsoleOutput::Writer(w) => writeln!(w, "{text}").and_then(|_| w.flush()),
        };
        if let Err(e) = result {
            debug!("console write failed: {}", e);
        }

        self.last_source = Some(record.source);
    }

    /// Look up or assign the color for a source.
    fn color_of(&self, source: &str) -> ColorSpec {
        let mut colors = self.colors.lock().unwrap_or_else(PoisonError::into_inner);
        *colors
            .entry(source.to_string())
            .or_insert_with(|| ColorSpec::foreground(self.allocator.next_color()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::palette::Color;

    fn capture_sink(colorize: bool) -> (Arc<ConsoleSink>, ConsoleCapture) {
        let capture = ConsoleCapture::new();
        let config = ConsoleConfig::default()
            .colorize(colorize)
            .writer(capture.clone());
        (ConsoleSink::start(config), capture)
    }

    fn text(source: &Arc<str>, line: &str) -> Record {
        Record::new(source.clone(), Line::Text(line.to_string()))
    }

    #[test]
    fn test_format_line_columns() {
        let line = format_line(Duration::from_millis(1500), "proc:stdout", "hello");
        assert_eq!(line, "   1.500 |       proc:stdout | hello");

        let line = format_line(Duration::ZERO, "", "x");
        assert_eq!(line, "   0.000 |                   | x");
    }

    #[test]
    fn test_format_line_truncates_long_names() {
        let line = format_line(Duration::ZERO, "a-very-long-source-name", "x");
        assert_eq!(line, "   0.000 | a-very-long-sourc | x");
    }

    #[tokio::test]
    async fn test_repeated_source_name_blanked() {
        let (sink, capture) = capture_sink(false);
        let a: Arc<str> = Arc::from("alpha");
        let b: Arc<str> = Arc::from("beta");

        sink.submit(text(&a, "one"));
        sink.submit(text(&a, "two"));
        sink.submit(text(&b, "three"));
        sink.submit(text(&a, "four"));
        sink.stop().await;

        let lines = capture.lines();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("|             alpha | one"));
        assert!(lines[1].ends_with("|                   | two"));
        assert!(lines[2].ends_with("|              beta | three"));
        assert!(lines[3].ends_with("|             alpha | four"));
        assert!(lines[4].ends_with("|           console | stopping"));
    }

    #[tokio::test]
    async fn test_stop_flushes_backlog() {
        let (sink, capture) = capture_sink(false);
        let src: Arc<str> = Arc::from("bulk");
        for i in 0..500 {
            sink.submit(text(&src, &format!("line {i}")));
        }
        sink.stop().await;

        let lines = capture.lines();
        assert_eq!(lines.len(), 501);
        for (i, line) in lines.iter().take(500).enumerate() {
            assert!(line.ends_with(&format!("line {i}")), "out of order: {line}");
        }
    }

    #[tokio::test]
    async fn test_submit_after_stop_is_dropped() {
        let (sink, capture) = capture_sink(false);
        sink.stop().await;
        sink.print("late");
        sink.stop().await;
        assert!(!capture.contents().contains("late"));
        assert!(!sink.is_running());
    }

    #[tokio::test]
    async fn test_color_assignment_is_first_seen_order() {
        let (sink, capture) = capture_sink(true);
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        let c: Arc<str> = Arc::from("c");

        sink.submit(text(&b, "1"));
        sink.submit(text(&a, "2"));
        sink.submit(text(&b, "3"));
        sink.submit(text(&c, "4"));
        sink.stop().await;

        assert_eq!(sink.sources(), vec!["b", "a", "c", CONSOLE_LABEL]);
        assert_eq!(sink.color_for("b").map(|s| s.foreground), Some(Color::Green));
        assert_eq!(sink.color_for("a").map(|s| s.foreground), Some(Color::Yellow));
        assert_eq!(sink.color_for("c").map(|s| s.foreground), Some(Color::Blue));

        let lines = capture.lines();
        // "b" reused its color on its second line
        assert!(lines[0].starts_with("\x1b[0;92;48m"));
        assert!(lines[2].starts_with("\x1b[0;92;48m"));
        assert!(lines[0].ends_with("\x1b[0m"));
    }

    #[test]
    fn test_sink_outlives_the_runtime_that_started_it() {
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
        };

        let first = runtime();
        let (sink, capture) = first.block_on(async { capture_sink(false) });
        first.block_on(async { sink.print("from the first runtime") });
        drop(first);

        assert!(sink.is_running());
        let second = runtime();
        second.block_on(async {
            sink.print("from the second runtime");
            sink.stop().await;
        });

        let text = capture.contents();
        assert!(text.contains("from the first runtime"));
        assert!(text.contains("from the second runtime"));
    }

    #[tokio::test]
    async fn test_every_accepted_record_is_printed_when_stopping_concurrently() {
        let (sink, capture) = capture_sink(false);
        let producer = {
            let sink = sink.clone();
            std::thread::spawn(move || {
                let src: Arc<str> = Arc::from("busy");
                let mut accepted = 0usize;
                for i in 0..20_000 {
                    if sink.submit(text(&src, &format!("line {i}"))) {
                        accepted += 1;
                    }
                }
                accepted
            })
        };

        tokio::time::sleep(Duration::from_millis(2)).await;
        sink.stop().await;
        let accepted = producer.join().unwrap();

        let lines = capture.lines();
        assert_eq!(lines.last().map(|l| l.ends_with("| stopping")), Some(true));
        assert_eq!(lines.len() - 1, accepted);
    }

    #[tokio::test]
    async fn test_sentinels_are_printed() {
        let (sink, capture) = capture_sink(false);
        let src: Arc<str> = Arc::from("s");
        sink.submit(Record::new(src.clone(), Line::Eof));
        sink.stop().await;
        assert!(capture.lines()[0].ends_with("| <<EOF>>"));
    }
}
