use crate::ProvisionError;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for build-log lines.
pub trait LogSink: Send + Sync {
    fn line(&self, message: &str);
}

/// Presentation hints the provisioning tool attaches to UI calls. The
/// wrapper accepts them and renders nothing differently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiOptions {
    pub prefix: bool,
    pub new_line: bool,
    pub bold: bool,
    pub color: Option<String>,
}

/// UI callbacks a provisioning session reports through.
pub trait Ui: Send + Sync {
    fn info(&self, message: &str, options: &UiOptions);

    fn warn(&self, message: &str, options: &UiOptions);

    fn error(&self, message: &str, options: &UiOptions);

    fn success(&self, message: &str, options: &UiOptions);

    /// Ask the operator a question and return the answer.
    fn ask(&self, message: &str, options: &UiOptions) -> Result<String, ProvisionError>;

    fn clear_line(&self);

    fn report_progress(&self, progress: u64, total: Option<u64>);
}

/// Proxies provisioning-tool UI output into the build log.
///
/// Every message becomes exactly one log line, written synchronously in call
/// order. Builds are unattended, so `ask` always fails.
#[derive(Clone)]
pub struct OutputAdapter {
    sink: Arc<dyn LogSink>,
}

impl OutputAdapter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl Ui for OutputAdapter {
    fn info(&self, message: &str, _options: &UiOptions) {
        self.sink.line(message);
    }

    fn warn(&self, message: &str, _options: &UiOptions) {
        self.sink.line(message);
    }

    fn error(&self, message: &str, _options: &UiOptions) {
        self.sink.line(message);
    }

    fn success(&self, message: &str, _options: &UiOptions) {
        self.sink.line(message);
    }

    fn ask(&self, message: &str, _options: &UiOptions) -> Result<String, ProvisionError> {
        self.sink.line(message);
        Err(ProvisionError::InteractiveInputUnavailable(
            message.to_owned(),
        ))
    }

    fn clear_line(&self) {}

    fn report_progress(&self, _progress: u64, _total: Option<u64>) {}
}

/// Writes each line to an underlying writer and flushes it immediately.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn line(&self, message: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            tracing::warn!("log sink mutex poisoned; dropping line: {message}");
            return;
        };
        if let Err(e) = writeln!(writer, "{message}").and_then(|()| writer.flush()) {
            tracing::warn!("failed to write build log line: {e}");
        }
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn line(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_owned());
        }
    }
}
