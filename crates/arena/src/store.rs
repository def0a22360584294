//! Run result persistence.
//!
//! The executor saves every [`RunResult`] as soon as it is built; the report
//! step later loads them back by [`RunId`].

use crate::error::{ArenaError, ArenaResult, ErrorCode};
use crate::model::{RunId, RunResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ResultStore: Send + Sync {
    fn save(&self, result: &RunResult) -> ArenaResult<()>;
    fn load(&self, run_id: &RunId) -> ArenaResult<RunResult>;
}

/// Writes one pretty-printed JSON file per run into a directory.
#[derive(Clone, Debug)]
pub struct FileResultStore {
    dir: PathBuf,
}

impl FileResultStore {
    /// Create the store, creating `dir` if it does not exist yet.
    pub fn create(dir: impl Into<PathBuf>) -> ArenaResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| {
            ArenaError::new(ErrorCode::Io, "failed to create output dir")
                .with_context(serde_json::json!({ "dir": dir, "source": err.to_string() }))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(run_id.result_file_name())
    }
}

impl ResultStore for FileResultStore {
    fn save(&self, result: &RunResult) -> ArenaResult<()> {
        let data = serde_json::to_vec_pretty(result)
            .map_err(|err| ArenaError::store("failed to serialize run result", err))?;
        let path = self.path_for(&result.run_id);
        fs::write(&path, data)
            .map_err(|err| ArenaError::store("failed to write run result", err))?;
        Ok(())
    }

    fn load(&self, run_id: &RunId) -> ArenaResult<RunResult> {
        read_result_file(&self.path_for(run_id))
    }
}

/// Read and parse a single result file.
pub fn read_result_file(path: &Path) -> ArenaResult<RunResult> {
    let content = fs::read_to_string(path)
        .map_err(|err| ArenaError::store("failed to read run result", err))?;
    serde_json::from_str(&content)
        .map_err(|err| ArenaError::store("failed to parse run result", err))
}

/// In-process store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<RunId, RunResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &RunResult) -> ArenaResult<()> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| ArenaError::internal("result store lock poisoned"))?;
        results.insert(result.run_id, result.clone());
        Ok(())
    }

    fn load(&self, run_id: &RunId) -> ArenaResult<RunResult> {
        let results = self
            .results
            .lock()
            .map_err(|_| ArenaError::internal("result store lock poisoned"))?;
        results.get(run_id).cloned().ok_or_else(|| {
            ArenaError::new(ErrorCode::Store, "run result not found")
                .with_context(serde_json::json!({ "run_id": run_id }))
        })
    }
}
