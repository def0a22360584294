//! Error taxonomy shared by the executor, the stores and the CLI.
//!
//! Every fatal condition surfaces as an [`ArenaError`] carrying a stable
//! [`ErrorCode`]. Per-run provider failures are *not* errors at this level;
//! they are recorded inside [`crate::model::RunResult::error`].

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result alias used across the crate.
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Stable error codes with their process exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Plan or engine construction failed before dispatch.
    #[serde(rename = "E_SETUP")]
    Setup,
    /// A command-line argument was rejected.
    #[serde(rename = "E_INVALID_ARG")]
    InvalidArg,
    /// The provider capability could not be reached at all.
    #[serde(rename = "E_PROVIDER_UNREACHABLE")]
    ProviderUnreachable,
    /// A run result could not be persisted or loaded.
    #[serde(rename = "E_STORE")]
    Store,
    /// Execution was canceled before the plan was exhausted.
    #[serde(rename = "E_CANCELED")]
    Canceled,
    /// The terminal dashboard failed.
    #[serde(rename = "E_PRESENTATION")]
    Presentation,
    /// Filesystem or stream failure.
    #[serde(rename = "E_IO")]
    Io,
    /// A report index referenced no readable result file.
    #[serde(rename = "E_NO_VALID_RESULTS")]
    NoValidResults,
    /// Invariant violation inside the orchestrator (e.g. a worker panic).
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    /// All codes, in documentation order.
    pub const ALL: [Self; 9] = [
        Self::Setup,
        Self::InvalidArg,
        Self::ProviderUnreachable,
        Self::Store,
        Self::Canceled,
        Self::Presentation,
        Self::Io,
        Self::NoValidResults,
        Self::Internal,
    ];

    /// Stable string form, e.g. `E_SETUP`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "E_SETUP",
            Self::InvalidArg => "E_INVALID_ARG",
            Self::ProviderUnreachable => "E_PROVIDER_UNREACHABLE",
            Self::Store => "E_STORE",
            Self::Canceled => "E_CANCELED",
            Self::Presentation => "E_PRESENTATION",
            Self::Io => "E_IO",
            Self::NoValidResults => "E_NO_VALID_RESULTS",
            Self::Internal => "E_INTERNAL",
        }
    }

    /// Parse the string form back into a code.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Process exit code for this error class.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Setup | Self::InvalidArg => 2,
            Self::ProviderUnreachable | Self::Store => 3,
            Self::Presentation => 4,
            Self::Io | Self::NoValidResults => 5,
            Self::Internal => 10,
            Self::Canceled => 130,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal orchestrator error.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ArenaError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl Diagnostic for ArenaError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }
}

impl ArenaError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Setup, message)
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArg, message)
    }

    pub fn unreachable_provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnreachable, message)
    }

    pub fn canceled() -> Self {
        Self::new(ErrorCode::Canceled, "execution canceled")
    }

    pub fn presentation(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Presentation, message)
            .with_context(serde_json::json!({ "source": err.to_string() }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Io, message)
            .with_context(serde_json::json!({ "source": err.to_string() }))
    }

    pub fn store(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Store, message)
            .with_context(serde_json::json!({ "source": err.to_string() }))
    }

    pub fn no_valid_results(index: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NoValidResults, "no valid result files")
            .with_context(serde_json::json!({ "index": index.to_string() }))
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    pub fn is_canceled(&self) -> bool {
        self.code == ErrorCode::Canceled
    }
}
