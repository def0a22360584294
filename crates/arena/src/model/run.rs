use crate::model::{Combination, RunId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One conversation message returned by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Outcome of executing one combination. Built once, never mutated.
///
/// `error` holds a provider-level failure for this run only; it is metadata
/// for the summary and report, not a dispatch fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_result_version: u32,
    pub run_id: RunId,
    pub scenario_id: String,
    pub provider_id: String,
    pub region: String,
    pub messages: Vec<Message>,
    pub error: Option<String>,
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn new(
        run_id: RunId,
        combination: &Combination,
        outcome: Result<Vec<Message>, String>,
        started_at_ms: u64,
        duration: Duration,
    ) -> Self {
        let (messages, error) = match outcome {
            Ok(messages) => (messages, None),
            Err(err) => (Vec::new(), Some(err)),
        };
        Self {
            run_result_version: RUN_RESULT_VERSION,
            run_id,
            scenario_id: combination.scenario.clone(),
            provider_id: combination.provider.clone(),
            region: combination.region.clone(),
            messages,
            error,
            started_at_ms,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn combination(&self) -> Combination {
        Combination::new(
            self.region.as_str(),
            self.provider_id.as_str(),
            self.scenario_id.as_str(),
        )
    }
}

/// Status of a run as tracked by the progress model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

pub const RUN_RESULT_VERSION: u32 = 1;
