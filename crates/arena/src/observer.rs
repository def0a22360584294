//! Progress events and the observers that receive them.
//!
//! The executor reports through [`Observer`] only. Two implementations cover
//! the two presentation modes:
//!
//! - [`ChannelObserver`] forwards every event into the dashboard's mailbox and
//!   returns immediately. Workers never wait on the renderer.
//! - [`ModelObserver`] applies every event to a shared [`ProgressModel`] under
//!   one lock. It is the only multi-writer contention point in headless runs.

use crate::model::{Combination, RunId, RunResult};
use crate::progress::ProgressModel;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::Level;

/// A combination was dispatched and is about to invoke its provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunStarted {
    /// Position of the combination in the plan (0-based).
    pub index: usize,
    /// Plan size.
    pub total: usize,
    pub run_id: RunId,
    pub combination: Combination,
}

/// A combination finished and its result was persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunCompleted {
    pub index: usize,
    pub result: Arc<RunResult>,
}

/// A log record routed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub text: String,
}

impl LogLine {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Event emitted during plan execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted(RunStarted),
    RunCompleted(RunCompleted),
    LogLine(LogLine),
}

/// Trait for receiving progress during execution.
///
/// Implementations are called concurrently from every worker and must not
/// block them.
pub trait Observer: Send + Sync {
    fn on_run_start(&self, event: RunStarted);
    fn on_run_complete(&self, event: RunCompleted);
    fn on_log(&self, event: LogLine);
}

/// Route an event to the matching observer method.
pub fn forward(observer: &dyn Observer, event: ProgressEvent) {
    match event {
        ProgressEvent::RunStarted(event) => observer.on_run_start(event),
        ProgressEvent::RunCompleted(event) => observer.on_run_complete(event),
        ProgressEvent::LogLine(event) => observer.on_log(event),
    }
}

/// Observer that discards all events.
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_run_start(&self, _event: RunStarted) {}
    fn on_run_complete(&self, _event: RunCompleted) {}
    fn on_log(&self, _event: LogLine) {}
}

/// Receiving end of a [`ChannelObserver`]; consumed by exactly one render loop.
pub type Mailbox = mpsc::UnboundedReceiver<ProgressEvent>;

/// Forwards events into a render loop's mailbox.
///
/// The channel is unbounded so a slow renderer never stalls the executor;
/// per-worker ordering is preserved by the channel. Once the render loop has
/// gone away, events are dropped.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, Mailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // Ignore send error if the renderer already exited
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_run_start(&self, event: RunStarted) {
        self.send(ProgressEvent::RunStarted(event));
    }

    fn on_run_complete(&self, event: RunCompleted) {
        self.send(ProgressEvent::RunCompleted(event));
    }

    fn on_log(&self, event: LogLine) {
        self.send(ProgressEvent::LogLine(event));
    }
}

/// Applies events to a shared model, serialized by a single mutex.
///
/// An optional echo observer sees each event after it was applied, while the
/// lock is still held, so echoed output follows model order.
#[derive(Clone)]
pub struct ModelObserver {
    model: Arc<Mutex<ProgressModel>>,
    echo: Option<Arc<dyn Observer>>,
}

impl ModelObserver {
    pub fn new(model: Arc<Mutex<ProgressModel>>) -> Self {
        Self { model, echo: None }
    }

    #[must_use]
    pub fn with_echo(mut self, echo: Arc<dyn Observer>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn model(&self) -> Arc<Mutex<ProgressModel>> {
        Arc::clone(&self.model)
    }

    fn apply(&self, event: ProgressEvent) {
        // A panicking echo must not stop progress accounting
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        model.apply(&event);
        if let Some(echo) = &self.echo {
            forward(echo.as_ref(), event);
        }
    }
}

impl Observer for ModelObserver {
    fn on_run_start(&self, event: RunStarted) {
        self.apply(ProgressEvent::RunStarted(event));
    }

    fn on_run_complete(&self, event: RunCompleted) {
        self.apply(ProgressEvent::RunCompleted(event));
    }

    fn on_log(&self, event: LogLine) {
        self.apply(ProgressEvent::LogLine(event));
    }
}

/// Observer that records every event, for tests.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Observer for CollectingObserver {
    fn on_run_start(&self, event: RunStarted) {
        self.push(ProgressEvent::RunStarted(event));
    }

    fn on_run_complete(&self, event: RunCompleted) {
        self.push(ProgressEvent::RunCompleted(event));
    }

    fn on_log(&self, event: LogLine) {
        self.push(ProgressEvent::LogLine(event));
    }
}
