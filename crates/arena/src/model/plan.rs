use serde::{Deserialize, Serialize};
use std::fmt;

/// One (region, provider, scenario) tuple slated for execution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub region: String,
    pub provider: String,
    pub scenario: String,
}

impl Combination {
    pub fn new(
        region: impl Into<String>,
        provider: impl Into<String>,
        scenario: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            provider: provider.into(),
            scenario: scenario.into(),
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.scenario, self.region)
    }
}

/// Ordered set of combinations. Order is dispatch order only; completion
/// order under concurrency is unspecified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub combinations: Vec<Combination>,
}

impl RunPlan {
    pub fn new(combinations: Vec<Combination>) -> Self {
        Self { combinations }
    }

    /// Cartesian product of the filters, regions outermost and scenarios
    /// innermost. Any empty filter yields an empty plan.
    pub fn from_filters(regions: &[String], providers: &[String], scenarios: &[String]) -> Self {
        let mut combinations =
            Vec::with_capacity(regions.len() * providers.len() * scenarios.len());
        for region in regions {
            for provider in providers {
                for scenario in scenarios {
                    combinations.push(Combination::new(
                        region.as_str(),
                        provider.as_str(),
                        scenario.as_str(),
                    ));
                }
            }
        }
        Self { combinations }
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Combination> {
        self.combinations.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Combination> {
        self.combinations.iter()
    }
}

impl FromIterator<Combination> for RunPlan {
    fn from_iter<I: IntoIterator<Item = Combination>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
