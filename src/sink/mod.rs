//! Output channels the engine writes human-readable lines to.
//!
//! The engine never logs its results ambiently: every run is handed a
//! primary channel (progress and summary lines) and a diagnostic channel
//! (per-query error detail and fatal errors). `emit` is fire-and-forget;
//! implementations swallow their own failures and must not block
//! indefinitely.

use std::io::Write;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

/// Receiver of output lines.
pub trait Sink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Which of the two channels a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Primary,
    Diagnostic,
}

/// The pair of channels handed to a run.
#[derive(Clone, Copy)]
pub struct Sinks<'a> {
    primary: &'a dyn Sink,
    diagnostic: &'a dyn Sink,
}

impl<'a> Sinks<'a> {
    pub fn new(primary: &'a dyn Sink, diagnostic: &'a dyn Sink) -> Self {
        Sinks { primary, diagnostic }
    }

    pub fn emit(&self, channel: Channel, line: &str) {
        match channel {
            Channel::Primary => self.primary.emit(line),
            Channel::Diagnostic => self.diagnostic.emit(line),
        }
    }

    pub fn primary(&self, line: &str) {
        self.primary.emit(line)
    }

    pub fn diagnostic(&self, line: &str) {
        self.diagnostic.emit(line)
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Sink for MemorySink {
    fn emit(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

/// Writes each line, newline-terminated, to an `io::Write`. Write errors are dropped.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl WriterSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn emit(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

/// Forwards lines to `tracing` events tagged with the channel.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    channel: Channel,
}

impl TracingSink {
    pub fn new(channel: Channel) -> Self {
        TracingSink { channel }
    }
}

impl Sink for TracingSink {
    fn emit(&self, line: &str) {
        match self.channel {
            Channel::Primary => tracing::info!(channel = "primary", "{line}"),
            Channel::Diagnostic => tracing::warn!(channel = "diagnostic", "{line}"),
        }
    }
}

/// Sends lines to another thread. A closed receiver is ignored.
#[derive(Debug)]
pub struct ChannelSink {
    channel: Channel,
    tx: Mutex<Sender<(Channel, String)>>,
}

impl ChannelSink {
    pub fn new(channel: Channel, tx: Sender<(Channel, String)>) -> Self {
        ChannelSink { channel, tx: Mutex::new(tx) }
    }
}

impl Sink for ChannelSink {
    fn emit(&self, line: &str) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send((self.channel, line.to_string()));
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&self, _line: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit("a");
        sink.emit("b");
        assert_eq!(sink.lines(), vec!["a", "b"]);
        assert!(sink.contains("b"));
    }

    #[test]
    fn test_sinks_route_by_channel() {
        let primary = MemorySink::new();
        let diagnostic = MemorySink::new();
        let sinks = Sinks::new(&primary, &diagnostic);
        sinks.emit(Channel::Primary, "progress");
        sinks.diagnostic("oops");
        assert_eq!(primary.lines(), vec!["progress"]);
        assert_eq!(diagnostic.lines(), vec!["oops"]);
    }

    #[test]
    fn test_writer_sink_appends_newlines() {
        let sink = WriterSink::new(Vec::new());
        sink.emit("one");
        sink.emit("two");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_writer_sink_swallows_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Err(std::io::Error::other("closed"))
            }
        }
        WriterSink::new(Broken).emit("dropped");
    }

    #[test]
    fn test_channel_sink_crosses_threads() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(Channel::Diagnostic, tx);
        std::thread::scope(|s| {
            s.spawn(|| sink.emit("from worker"));
        });
        assert_eq!(rx.recv().unwrap(), (Channel::Diagnostic, "from worker".to_string()));
        drop(rx);
        sink.emit("receiver gone");
    }
}
