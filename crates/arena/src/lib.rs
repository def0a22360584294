//! Arena: concurrent execution of provider × scenario × region run plans.
//!
//! The [`executor::Executor`] runs a [`model::RunPlan`] with bounded
//! parallelism and reports through an [`observer::Observer`]. Callers pick a
//! presentation mode with [`mode::select_mode`]: the interactive dashboard
//! lives in the CLI crate, the headless path is [`headless::run_headless`].
//! Results are persisted per run and summarized into an index and an optional
//! HTML report.

#![forbid(unsafe_code)]
// Public API types have docs; accessors and internal types are documented as
// the API settles.
#![allow(missing_docs)]

pub mod error;
pub mod executor;
pub mod headless;
pub mod logging;
pub mod mode;
pub mod model;
pub mod observer;
pub mod progress;
pub mod provider;
pub mod report;
pub mod store;
pub mod summary;

pub use crate::error::{ArenaError, ArenaResult, ErrorCode};
pub use crate::model::*;
