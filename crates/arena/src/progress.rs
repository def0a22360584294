//! Aggregate view of a running plan.
//!
//! [`ProgressModel`] is mutated only through [`ProgressModel::apply`], either
//! from a [`crate::observer::ModelObserver`] or from the single-threaded
//! dashboard loop draining its mailbox.

use crate::model::{Combination, Message, RunId, RunStatus};
use crate::observer::{LogLine, ProgressEvent, RunCompleted, RunStarted};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Number of recent log lines kept for display.
pub const MAX_LOG_LINES: usize = 100;

/// Per-run state tracked by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRecord {
    pub index: usize,
    pub run_id: RunId,
    pub combination: Combination,
    pub status: RunStatus,
    pub duration: Option<Duration>,
    pub error: Option<String>,
    /// Conversation returned by the provider, filled on completion.
    pub messages: Vec<Message>,
}

impl RunRecord {
    pub fn is_terminal(&self) -> bool {
        self.status != RunStatus::Running
    }
}

#[derive(Clone, Debug)]
pub struct ProgressModel {
    total: usize,
    started_count: usize,
    completed_count: usize,
    failed_count: usize,
    records: Vec<RunRecord>,
    by_id: HashMap<RunId, usize>,
    logs: VecDeque<LogLine>,
    started_at: Instant,
}

impl ProgressModel {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started_count: 0,
            completed_count: 0,
            failed_count: 0,
            records: Vec::with_capacity(total),
            by_id: HashMap::with_capacity(total),
            logs: VecDeque::with_capacity(MAX_LOG_LINES),
            started_at: Instant::now(),
        }
    }

    /// Apply one event. Duplicate or out-of-order events are ignored so the
    /// counters never exceed `total`.
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted(event) => self.on_started(event),
            ProgressEvent::RunCompleted(event) => self.on_completed(event),
            ProgressEvent::LogLine(line) => self.push_log(line.clone()),
        }
    }

    fn on_started(&mut self, event: &RunStarted) {
        if self.by_id.contains_key(&event.run_id) || self.started_count >= self.total {
            tracing::debug!(run_id = %event.run_id, "ignoring unexpected run start");
            return;
        }
        self.started_count += 1;
        self.by_id.insert(event.run_id, self.records.len());
        self.records.push(RunRecord {
            index: event.index,
            run_id: event.run_id,
            combination: event.combination.clone(),
            status: RunStatus::Running,
            duration: None,
            error: None,
            messages: Vec::new(),
        });
    }

    fn on_completed(&mut self, event: &RunCompleted) {
        let result = &event.result;
        let Some(record) = self
            .by_id
            .get(&result.run_id)
            .and_then(|&slot| self.records.get_mut(slot))
        else {
            tracing::debug!(run_id = %result.run_id, "ignoring completion without start");
            return;
        };
        if record.is_terminal() {
            return;
        }
        record.duration = Some(Duration::from_millis(result.duration_ms));
        record.error.clone_from(&result.error);
        record.messages.clone_from(&result.messages);
        record.status = if result.is_success() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.completed_count += 1;
        if !result.is_success() {
            self.failed_count += 1;
        }
    }

    fn push_log(&mut self, line: LogLine) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn started_count(&self) -> usize {
        self.started_count
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn succeeded_count(&self) -> usize {
        self.completed_count - self.failed_count
    }

    pub fn in_flight(&self) -> usize {
        self.started_count - self.completed_count
    }

    pub fn is_finished(&self) -> bool {
        self.completed_count == self.total
    }

    /// Records in start order.
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Records sorted by plan index.
    pub fn records_in_plan_order(&self) -> Vec<&RunRecord> {
        let mut records: Vec<&RunRecord> = self.records.iter().collect();
        records.sort_by_key(|record| record.index);
        records
    }

    pub fn record(&self, run_id: &RunId) -> Option<&RunRecord> {
        self.by_id
            .get(run_id)
            .and_then(|&slot| self.records.get(slot))
    }

    /// Ids of every completed run, in plan order.
    pub fn completed_run_ids(&self) -> Vec<RunId> {
        self.records_in_plan_order()
            .into_iter()
            .filter(|record| record.is_terminal())
            .map(|record| record.run_id)
            .collect()
    }

    pub fn logs(&self) -> impl DoubleEndedIterator<Item = &LogLine> + ExactSizeIterator {
        self.logs.iter()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Mean duration over completed runs.
    pub fn average_duration(&self) -> Option<Duration> {
        let durations: Vec<Duration> = self.records.iter().filter_map(|r| r.duration).collect();
        let count = u32::try_from(durations.len()).ok().filter(|n| *n > 0)?;
        Some(durations.iter().sum::<Duration>() / count)
    }
}

/// Lifecycle of the interactive presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    Initializing,
    Running,
    /// The user left the dashboard before the executor finished.
    UserExit,
    /// The executor finished while the dashboard was up.
    Completed,
    Finalizing,
    Terminated,
}

impl RenderState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initializing, Self::Running)
                | (Self::Running, Self::UserExit | Self::Completed)
                | (Self::UserExit | Self::Completed, Self::Finalizing)
                | (Self::Finalizing, Self::Terminated)
        )
    }

    pub fn is_done(self) -> bool {
        matches!(self, Self::Finalizing | Self::Terminated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Message, RunResult};
    use std::sync::Arc;
    use tracing::Level;

    fn start(model: &mut ProgressModel, index: usize) -> RunStarted {
        let event = RunStarted {
            index,
            total: model.total(),
            run_id: RunId::new(),
            combination: Combination::new("us", "mock", format!("s{index}")),
        };
        model.apply(&ProgressEvent::RunStarted(event.clone()));
        event
    }

    fn complete(model: &mut ProgressModel, started: &RunStarted, error: Option<&str>) {
        let outcome = match error {
            Some(err) => Err(err.to_string()),
            None => Ok(vec![Message::assistant("ok")]),
        };
        let result = RunResult::new(
            started.run_id,
            &started.combination,
            outcome,
            0,
            Duration::from_millis(10),
        );
        model.apply(&ProgressEvent::RunCompleted(RunCompleted {
            index: started.index,
            result: Arc::new(result),
        }));
    }

    #[test]
    fn counts_follow_events() {
        let mut model = ProgressModel::new(3);
        let first = start(&mut model, 0);
        let second = start(&mut model, 1);
        complete(&mut model, &second, Some("boom"));
        complete(&mut model, &first, None);

        assert_eq!(model.started_count(), 2);
        assert_eq!(model.completed_count(), 2);
        assert_eq!(model.failed_count(), 1);
        assert_eq!(model.succeeded_count(), 1);
        assert_eq!(model.in_flight(), 0);
        assert!(!model.is_finished());
        assert_eq!(
            model.completed_run_ids(),
            vec![first.run_id, second.run_id]
        );
    }

    #[test]
    fn completion_keeps_the_conversation() {
        let mut model = ProgressModel::new(1);
        let only = start(&mut model, 0);
        assert!(model.record(&only.run_id).unwrap().messages.is_empty());

        complete(&mut model, &only, None);
        let record = model.record(&only.run_id).unwrap();
        assert_eq!(record.messages, vec![Message::assistant("ok")]);
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let mut model = ProgressModel::new(1);
        let only = start(&mut model, 0);
        complete(&mut model, &only, None);
        complete(&mut model, &only, Some("late"));

        assert_eq!(model.completed_count(), 1);
        assert_eq!(model.failed_count(), 0);
        assert!(model.is_finished());
    }

    #[test]
    fn starts_never_exceed_total() {
        let mut model = ProgressModel::new(1);
        start(&mut model, 0);
        start(&mut model, 1);
        assert_eq!(model.started_count(), 1);
    }

    #[test]
    fn log_lines_are_capped() {
        let mut model = ProgressModel::new(0);
        for i in 0..(MAX_LOG_LINES + 5) {
            model.apply(&ProgressEvent::LogLine(LogLine::new(
                Level::INFO,
                format!("line {i}"),
            )));
        }
        assert_eq!(model.logs().len(), MAX_LOG_LINES);
        assert_eq!(model.logs().next().unwrap().text, "line 5");
    }

    #[test]
    fn render_state_edges() {
        type S = RenderState;
        assert!(S::Initializing.can_transition_to(S::Running));
        assert!(S::Running.can_transition_to(S::UserExit));
        assert!(S::Running.can_transition_to(S::Completed));
        assert!(S::Completed.can_transition_to(S::Finalizing));
        assert!(S::UserExit.can_transition_to(S::Finalizing));
        assert!(S::Finalizing.can_transition_to(S::Terminated));
        assert!(!S::Running.can_transition_to(S::Terminated));
        assert!(!S::Terminated.can_transition_to(S::Running));
        assert!(!S::UserExit.can_transition_to(S::Completed));
    }
}
