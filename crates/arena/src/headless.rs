//! Headless execution: no terminal control, progress accumulated in a model.

use crate::executor::{ExecutionOutcome, Executor};
use crate::model::RunPlan;
use crate::observer::{ModelObserver, Observer};
use crate::progress::ProgressModel;
use crate::summary::Summary;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

pub struct HeadlessRun {
    pub outcome: ExecutionOutcome,
    pub model: ProgressModel,
}

impl HeadlessRun {
    pub fn summary(&self, out_dir: &Path, html_report: Option<&Path>) -> Summary {
        Summary::from_model(&self.model, out_dir, html_report)
    }
}

/// Run `plan` on the current task with a [`ModelObserver`] attached.
///
/// `echo`, when given, sees every event after the model applied it; the CLI
/// uses it for line output.
pub async fn run_headless(
    executor: Executor,
    plan: Arc<RunPlan>,
    concurrency: usize,
    cancel: CancellationToken,
    echo: Option<Arc<dyn Observer>>,
) -> HeadlessRun {
    let model = Arc::new(Mutex::new(ProgressModel::new(plan.len())));
    let mut observer = ModelObserver::new(Arc::clone(&model));
    if let Some(echo) = echo {
        observer = observer.with_echo(echo);
    }
    let outcome = executor
        .with_observer(Arc::new(observer))
        .execute_runs(cancel, plan, concurrency)
        .await;

    let model = model.lock().unwrap_or_else(PoisonError::into_inner).clone();
    HeadlessRun { outcome, model }
}
