// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Headless and channel-driven runs must summarize identically.

use arena::executor::Executor;
use arena::headless::run_headless;
use arena::observer::{ChannelObserver, Observer};
use arena::progress::ProgressModel;
use arena::provider::{MockConfig, MockProvider};
use arena::store::{MemoryResultStore, ResultStore};
use arena::summary::{render_summary, Summary, SummaryStyle};
use arena::RunPlan;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helper Functions
// =============================================================================

const CONFIG: &str = r"
default_response: hello
scenarios:
  refund:
    error: refunds disabled
";

fn plan() -> Arc<RunPlan> {
    let strings = |values: &[&str]| values.iter().map(|v| (*v).to_string()).collect::<Vec<_>>();
    Arc::new(RunPlan::from_filters(
        &strings(&["us", "eu"]),
        &strings(&["openai", "claude"]),
        &strings(&["greeting", "refund", "cancel"]),
    ))
}

fn executor() -> Executor {
    Executor::new(
        Arc::new(MockProvider::new(MockConfig::parse(CONFIG).unwrap())),
        Arc::new(MemoryResultStore::new()) as Arc<dyn ResultStore>,
    )
}

fn counts(summary: &Summary) -> (usize, usize, usize, usize, usize) {
    (
        summary.total,
        summary.started,
        summary.completed,
        summary.succeeded,
        summary.failed,
    )
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn headless_and_channel_observers_agree() {
    let plan = plan();

    let headless = run_headless(
        executor(),
        Arc::clone(&plan),
        3,
        CancellationToken::new(),
        None,
    )
    .await;
    assert!(headless.outcome.is_success());
    let headless_summary = headless.summary(Path::new("out"), None);

    let (observer, mut mailbox) = ChannelObserver::channel();
    let outcome = executor()
        .with_observer(Arc::new(observer) as Arc<dyn Observer>)
        .execute_runs(CancellationToken::new(), Arc::clone(&plan), 3)
        .await;
    assert!(outcome.is_success());
    let mut model = ProgressModel::new(plan.len());
    while let Ok(event) = mailbox.try_recv() {
        model.apply(&event);
    }
    let channel_summary = Summary::from_model(&model, Path::new("out"), None);

    assert_eq!(counts(&headless_summary), (12, 12, 12, 8, 4));
    assert_eq!(counts(&headless_summary), counts(&channel_summary));
    assert_eq!(
        headless_summary.provider_counts,
        channel_summary.provider_counts
    );
    assert_eq!(headless_summary.scenario_count, 3);
    assert_eq!(model.completed_run_ids(), outcome.run_ids);
}

#[tokio::test]
async fn plain_and_decorated_carry_the_same_facts() {
    let headless = run_headless(executor(), plan(), 2, CancellationToken::new(), None).await;
    let summary = headless.summary(Path::new("out"), Some(Path::new("out/report.html")));

    let plain = render_summary(&summary, SummaryStyle::Plain);
    let decorated = render_summary(&summary, SummaryStyle::Decorated { width: 100 });

    assert!(plain.contains("Errors: 4"));
    assert!(plain.contains("HTML report: out/report.html"));
    assert!(plain.contains("refunds disabled"));
    for line in plain.lines() {
        assert!(
            decorated.lines().any(|boxed| boxed.contains(line)),
            "missing from decorated summary: {line}"
        );
    }
    assert!(decorated.contains('✗'));
}
