//! Log interception while the dashboard owns the terminal.
//!
//! Anything written to stderr during a full-screen render corrupts the
//! display, so [`LogInterceptor`] sits between `tracing` and the real sink.
//! While interception is on, records are buffered (and appended to an
//! optional log file); when the guard returned by
//! [`LogInterceptor::start_intercepting`] drops, the buffer is flushed to the
//! sink in arrival order and the file is released.
//!
//! Nothing here installs a global subscriber. [`LogInterceptor::dispatch`]
//! returns a [`Dispatch`] that the caller scopes explicitly: the executor
//! runs its workers under it and the render thread sets it as its default.

use crate::error::{ArenaError, ArenaResult};
use crate::observer::{LogLine, Observer};
use std::fmt;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Filter, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// One formatted log event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5} {}: {}", self.level.as_str(), self.target, self.message)
    }
}

struct Inner {
    sink: Box<dyn Write + Send>,
    buffer: Vec<LogRecord>,
    file: Option<File>,
    intercepting: bool,
}

/// Buffering log sink. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LogInterceptor {
    inner: Arc<Mutex<Inner>>,
}

impl LogInterceptor {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink,
                buffer: Vec::new(),
                file: None,
                intercepting: false,
            })),
        }
    }

    /// Interceptor over the process stderr.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    /// Also append every record to `path`, creating it if needed.
    pub fn with_log_file(self, path: &Path) -> ArenaResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                ArenaError::io("failed to open log file", &err)
                    .with_context(serde_json::json!({ "path": path, "source": err.to_string() }))
            })?;
        self.lock().file = Some(file);
        Ok(self)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one record: buffer it while intercepting, otherwise write it
    /// through to the sink.
    pub fn handle(&self, record: LogRecord) {
        let mut inner = self.lock();
        if let Some(file) = inner.file.as_mut() {
            // Nowhere to report a failing log file
            let _ = writeln!(file, "{record}");
        }
        if inner.intercepting {
            inner.buffer.push(record);
        } else {
            let _ = writeln!(inner.sink, "{record}");
        }
    }

    /// Write every buffered record to the sink, oldest first.
    ///
    /// Returns the number of records drained. A write failure does not stop
    /// the drain; the first error is returned after all records were tried.
    pub fn flush_buffer(&self) -> ArenaResult<usize> {
        let mut inner = self.lock();
        let pending = std::mem::take(&mut inner.buffer);
        let count = pending.len();
        let mut first_err: Option<io::Error> = None;
        for record in pending {
            if let Err(err) = writeln!(inner.sink, "{record}") {
                first_err.get_or_insert(err);
            }
        }
        if let Err(err) = inner.sink.flush() {
            first_err.get_or_insert(err);
        }
        match first_err {
            Some(err) => Err(ArenaError::io("failed to flush buffered logs", err)),
            None => Ok(count),
        }
    }

    /// Release the log file. Returns whether a file was open.
    pub fn close(&self) -> bool {
        let mut inner = self.lock();
        match inner.file.take() {
            Some(mut file) => {
                let _ = file.flush();
                true
            }
            None => false,
        }
    }

    pub fn is_intercepting(&self) -> bool {
        self.lock().intercepting
    }

    pub fn has_log_file(&self) -> bool {
        self.lock().file.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Start buffering. Dropping the guard (or calling
    /// [`InterceptGuard::finish`]) stops, flushes and closes exactly once.
    pub fn start_intercepting(&self) -> InterceptGuard {
        self.lock().intercepting = true;
        InterceptGuard {
            interceptor: self.clone(),
            released: false,
        }
    }

    /// Build a standalone dispatch whose only output is this interceptor.
    ///
    /// When `observer` is set, each record is also forwarded as a
    /// [`LogLine`] so the dashboard can show it.
    /// `filter` is any per-layer filter: a [`tracing_subscriber::filter::LevelFilter`] or the same
    /// `EnvFilter` the process-wide subscriber uses.
    pub fn dispatch<F>(&self, filter: F, observer: Option<Arc<dyn Observer>>) -> Dispatch
    where
        F: Filter<Registry> + Send + Sync + 'static,
    {
        let layer = InterceptLayer::new(self.clone(), observer).with_filter(filter);
        Dispatch::new(tracing_subscriber::registry().with(layer))
    }
}

/// Ends interception when dropped.
#[must_use = "interception stops as soon as the guard is dropped"]
pub struct InterceptGuard {
    interceptor: LogInterceptor,
    released: bool,
}

impl InterceptGuard {
    /// Release explicitly and report flush errors.
    pub fn finish(mut self) -> ArenaResult<usize> {
        self.release()
    }

    fn release(&mut self) -> ArenaResult<usize> {
        if self.released {
            return Ok(0);
        }
        self.released = true;
        self.interceptor.lock().intercepting = false;
        let flushed = self.interceptor.flush_buffer();
        self.interceptor.close();
        flushed
    }
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// `tracing` layer that feeds events into a [`LogInterceptor`].
pub struct InterceptLayer {
    interceptor: LogInterceptor,
    observer: Option<Arc<dyn Observer>>,
}

impl InterceptLayer {
    pub fn new(interceptor: LogInterceptor, observer: Option<Arc<dyn Observer>>) -> Self {
        Self {
            interceptor,
            observer,
        }
    }
}

impl<S: Subscriber> Layer<S> for InterceptLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        let record = LogRecord::new(*meta.level(), meta.target(), visitor.finish());
        if let Some(observer) = &self.observer {
            observer.on_log(LogLine::new(record.level, record.message.clone()));
        }
        self.interceptor.handle(record);
    }
}

/// Collects the `message` field first and the remaining fields as `k=v`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
