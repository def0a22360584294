use crate::error::{ArenaError, ArenaResult};
use std::path::{Path, PathBuf};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Parameters fixed for the duration of one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionParams {
    pub concurrency: usize,
    pub ci_mode: bool,
    pub mock_provider: bool,
    pub mock_config_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub html_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            ci_mode: false,
            mock_provider: false,
            mock_config_path: None,
            out_dir: PathBuf::from("out"),
            html_file: None,
            verbose: false,
        }
    }
}

impl ExecutionParams {
    /// Reject parameter combinations that cannot start an execution.
    pub fn validate(&self) -> ArenaResult<()> {
        if self.concurrency == 0 {
            return Err(ArenaError::invalid_arg("concurrency must be at least 1")
                .with_context(serde_json::json!({ "concurrency": self.concurrency })));
        }
        if self.mock_config_path.is_some() && !self.mock_provider {
            return Err(ArenaError::invalid_arg(
                "--mock-config requires --mock-provider",
            ));
        }
        Ok(())
    }

    /// Resolve the HTML report path against the output directory.
    ///
    /// Relative paths are taken relative to `out_dir`; absolute paths are kept.
    pub fn resolved_html_file(&self) -> Option<PathBuf> {
        self.html_file
            .as_deref()
            .map(|path| resolve_output_path(&self.out_dir, path))
    }

    /// Path of the intercepted log file written in verbose interactive runs.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.verbose.then(|| self.out_dir.join("arena.log"))
    }
}

fn resolve_output_path(out_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        out_dir.join(path)
    }
}
