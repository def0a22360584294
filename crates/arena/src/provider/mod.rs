//! Provider invocation boundary.
//!
//! The executor only knows the [`ProviderInvoker`] capability. Whatever talks
//! to a real model lives behind it; this crate ships the [`mock`] backend used
//! for CI and tests.

pub mod mock;

use crate::model::{Combination, Message};
use core::future::Future;
use core::pin::Pin;

pub use mock::{MockConfig, MockProvider, MockScenario};

pub type InvokeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Message>, InvokeError>> + Send + 'a>>;

/// Failure returned by a provider invocation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// The call for this combination failed. Recorded on the run; dispatch
    /// continues.
    #[error("{0}")]
    Run(String),
    /// The capability itself is unreachable (connection or setup fault).
    /// Fatal for the whole execution.
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

/// Capability invoked once per combination by executor workers.
pub trait ProviderInvoker: Send + Sync + 'static {
    fn invoke<'a>(&'a self, combination: &'a Combination) -> InvokeFuture<'a>;
}
