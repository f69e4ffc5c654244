//! Scratch directories for one sweep invocation and for each of its trials

use std::path::Path;

use tempfile::TempDir;

use crate::constants::SCRATCH_PREFIX;
use crate::error::{BenchError, BenchResult};

/// Temporary directory removed when dropped, including on early return
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory below `root`, creating `root` if needed
    pub fn create(root: &Path) -> BenchResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| BenchError::io(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)
            .map_err(|e| BenchError::io(root, e))?;

        tracing::debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
