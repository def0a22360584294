//! Deterministic provider backend driven by an optional YAML file.
//!
//! ```yaml
//! default_response: "Hello from the mock provider"
//! latency_ms: 25
//! scenarios:
//!   refund:
//!     response: "Your refund is on its way"
//!   outage:
//!     error: "upstream returned 503"
//! ```

use crate::error::{ArenaError, ArenaResult};
use crate::model::{Combination, Message};
use crate::provider::{InvokeError, InvokeFuture, ProviderInvoker};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_RESPONSE: &str = "mock response";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    #[serde(default)]
    pub default_response: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub scenarios: BTreeMap<String, MockScenario>,
}

/// Per-scenario override. `error` wins over `response` when both are set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockScenario {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MockConfig {
    pub fn load(path: &Path) -> ArenaResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            ArenaError::setup("failed to read mock config").with_context(serde_json::json!({
                "path": path,
                "source": err.to_string(),
            }))
        })?;
        Self::parse(&content)
            .map_err(|err| err.with_context(serde_json::json!({ "path": path })))
    }

    pub fn parse(content: &str) -> ArenaResult<Self> {
        serde_yml::from_str(content)
            .map_err(|err| ArenaError::setup(format!("invalid mock config: {err}")))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockProvider {
    config: MockConfig,
}

impl MockProvider {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Build from an optional config file; no file means default responses.
    pub fn from_path(path: Option<&Path>) -> ArenaResult<Self> {
        let config = match path {
            Some(path) => MockConfig::load(path)?,
            None => MockConfig::default(),
        };
        Ok(Self::new(config))
    }

    fn respond(&self, combination: &Combination) -> Result<Vec<Message>, InvokeError> {
        let scenario = self.config.scenarios.get(&combination.scenario);
        if let Some(error) = scenario.and_then(|s| s.error.as_ref()) {
            return Err(InvokeError::Run(error.clone()));
        }
        let content = scenario
            .and_then(|s| s.response.clone())
            .or_else(|| self.config.default_response.clone())
            .unwrap_or_else(|| DEFAULT_RESPONSE.to_string());
        Ok(vec![Message::assistant(content)])
    }
}

impl ProviderInvoker for MockProvider {
    fn invoke<'a>(&'a self, combination: &'a Combination) -> InvokeFuture<'a> {
        Box::pin(async move {
            if self.config.latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
            }
            tracing::debug!(
                provider = %combination.provider,
                scenario = %combination.scenario,
                region = %combination.region,
                "mock provider responding"
            );
            self.respond(combination)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_overrides() {
        let config = MockConfig::parse(
            r"
default_response: hi
scenarios:
  outage:
    error: upstream 503
",
        )
        .unwrap();
        assert_eq!(config.default_response.as_deref(), Some("hi"));
        assert_eq!(
            config.scenarios.get("outage").and_then(|s| s.error.as_deref()),
            Some("upstream 503")
        );
    }

    #[test]
    fn unknown_fields_are_a_setup_fault() {
        let err = MockConfig::parse("bogus: true").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Setup);
    }

    #[tokio::test]
    async fn scenario_error_is_a_per_run_failure() {
        let mut config = MockConfig::default();
        config.scenarios.insert(
            "outage".to_string(),
            MockScenario {
                response: None,
                error: Some("503".to_string()),
            },
        );
        let provider = MockProvider::new(config);
        let ok = provider
            .invoke(&Combination::new("us", "mock", "greeting"))
            .await
            .unwrap();
        assert_eq!(ok, vec![Message::assistant(DEFAULT_RESPONSE)]);
        let err = provider
            .invoke(&Combination::new("us", "mock", "outage"))
            .await
            .unwrap_err();
        assert_eq!(err, InvokeError::Run("503".to_string()));
    }
}
