//! Bounded-concurrency plan execution.
//!
//! The executor walks a [`RunPlan`] with a fixed number of tokio workers that
//! share one atomic cursor, so combinations are dispatched in plan order and
//! each worker handles one combination at a time.
//!
//! Failure handling:
//!
//! - A provider error for one run ([`InvokeError::Run`]) is recorded in that
//!   run's [`RunResult::error`] and dispatch continues.
//! - An unreachable provider, a result store failure or a worker panic is
//!   fatal. The first one is kept, no further combinations are dispatched,
//!   workers already mid-run finish, and the error is returned together with
//!   every run id that completed.
//! - Cancellation is checked between combinations only.

use crate::error::{ArenaError, ArenaResult};
use crate::model::{Combination, RunId, RunPlan, RunResult};
use crate::observer::{NoopObserver, Observer, RunCompleted, RunStarted};
use crate::provider::{InvokeError, ProviderInvoker};
use crate::store::ResultStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

/// Result of [`Executor::execute_runs`].
///
/// `run_ids` is always populated with what completed, even when `error` is
/// set, and is ordered by plan index.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub run_ids: Vec<RunId>,
    pub error: Option<ArenaError>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, discarding partial ids on error.
    pub fn into_result(self) -> ArenaResult<Vec<RunId>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.run_ids),
        }
    }
}

#[derive(Clone)]
pub struct Executor {
    invoker: Arc<dyn ProviderInvoker>,
    store: Arc<dyn ResultStore>,
    observer: Arc<dyn Observer>,
    log_dispatch: Option<Dispatch>,
}

impl Executor {
    pub fn new(invoker: Arc<dyn ProviderInvoker>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            invoker,
            store,
            observer: Arc::new(NoopObserver),
            log_dispatch: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Run every worker under `dispatch` instead of the caller's subscriber.
    #[must_use]
    pub fn with_log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.log_dispatch = Some(dispatch);
        self
    }

    /// Execute `plan` with at most `concurrency` runs in flight.
    pub async fn execute_runs(
        &self,
        cancel: CancellationToken,
        plan: Arc<RunPlan>,
        concurrency: usize,
    ) -> ExecutionOutcome {
        if cancel.is_cancelled() {
            return ExecutionOutcome {
                run_ids: Vec::new(),
                error: Some(ArenaError::canceled()),
            };
        }
        let total = plan.len();
        if total == 0 {
            return ExecutionOutcome::default();
        }

        let workers = concurrency.clamp(1, total);
        tracing::debug!(total, workers, "executing plan");

        let shared = Arc::new(Shared {
            cursor: AtomicUsize::new(0),
            completed: Mutex::new(Vec::with_capacity(total)),
            fatal: Mutex::new(None),
            stop: cancel.child_token(),
        });

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let worker = Worker {
                plan: Arc::clone(&plan),
                invoker: Arc::clone(&self.invoker),
                store: Arc::clone(&self.store),
                observer: Arc::clone(&self.observer),
                shared: Arc::clone(&shared),
            };
            match &self.log_dispatch {
                Some(dispatch) => {
                    tasks.spawn(worker.run().with_subscriber(dispatch.clone()));
                }
                None => {
                    tasks.spawn(worker.run());
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                let message = if err.is_panic() {
                    "worker panicked"
                } else {
                    "worker task aborted"
                };
                shared.fail(ArenaError::internal(message));
            }
        }

        shared.finish(&cancel, total)
    }
}

struct Shared {
    cursor: AtomicUsize,
    completed: Mutex<Vec<(usize, RunId)>>,
    fatal: Mutex<Option<ArenaError>>,
    stop: CancellationToken,
}

impl Shared {
    fn record(&self, index: usize, run_id: RunId) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, run_id));
    }

    /// Keep the first fatal error and stop further dispatch.
    fn fail(&self, err: ArenaError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            tracing::error!(code = %err.code, error = %err.message, "stopping dispatch");
            *fatal = Some(err);
        }
        self.stop.cancel();
    }

    fn finish(&self, cancel: &CancellationToken, total: usize) -> ExecutionOutcome {
        let mut completed = std::mem::take(
            &mut *self.completed.lock().unwrap_or_else(PoisonError::into_inner),
        );
        completed.sort_by_key(|(index, _)| *index);
        let run_ids: Vec<RunId> = completed.into_iter().map(|(_, id)| id).collect();

        let fatal = self
            .fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let error = fatal.or_else(|| {
            (cancel.is_cancelled() && run_ids.len() < total).then(ArenaError::canceled)
        });
        ExecutionOutcome { run_ids, error }
    }
}

struct Worker {
    plan: Arc<RunPlan>,
    invoker: Arc<dyn ProviderInvoker>,
    store: Arc<dyn ResultStore>,
    observer: Arc<dyn Observer>,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.shared.stop.is_cancelled() {
                break;
            }
            let index = self.shared.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(combination) = self.plan.get(index) else {
                break;
            };
            match self.run_one(index, combination).await {
                Ok(run_id) => self.shared.record(index, run_id),
                Err(err) => {
                    self.shared.fail(err);
                    break;
                }
            }
        }
    }

    async fn run_one(&self, index: usize, combination: &Combination) -> ArenaResult<RunId> {
        let run_id = RunId::new();
        tracing::debug!(%run_id, %combination, index, "dispatching combination");
        self.observer.on_run_start(RunStarted {
            index,
            total: self.plan.len(),
            run_id,
            combination: combination.clone(),
        });

        let started_at_ms = unix_millis();
        let started = Instant::now();
        let outcome = match self.invoker.invoke(combination).await {
            Ok(messages) => Ok(messages),
            Err(InvokeError::Run(message)) => {
                tracing::warn!(%run_id, %combination, error = %message, "run failed");
                Err(message)
            }
            Err(InvokeError::Unreachable(message)) => {
                return Err(ArenaError::unreachable_provider(message).with_context(
                    serde_json::json!({ "combination": combination.to_string() }),
                ));
            }
        };

        let result = RunResult::new(run_id, combination, outcome, started_at_ms, started.elapsed());
        self.store.save(&result)?;
        self.observer.on_run_complete(RunCompleted {
            index,
            result: Arc::new(result),
        });
        Ok(run_id)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
