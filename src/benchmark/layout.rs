//! On-disk naming of matrix artifacts and trial logs
//!
//! ```text
//! <root>/<instance_dir>/<family>-<SSSSS>x<SSSSS>[-p<D.DD>]#<NNN>.sparse.gz
//! <root>/<instance_dir>/<family>-<SSSSS>x<SSSSS>[-p<D.DD>]#<NNN>-<algorithm>.out
//! <root>/<instance_dir>/<family>-<SSSSS>x<SSSSS>[-p<D.DD>]#<NNN>-<algorithm>.err
//! ```
//!
//! Every path is unique per (instance, sample, algorithm), so no two trials
//! ever write the same file.

use std::path::{Path, PathBuf};

use crate::constants::{
    ARTIFACT_EXTENSION, PARTIAL_SUFFIX, SAMPLE_ENCODING_WIDTH, STDERR_EXTENSION, STDOUT_EXTENSION,
};
use crate::models::{InstanceKey, TrialSpec};

/// Path convention of one sweep
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    dir: PathBuf,
    family: String,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>, family: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            family: family.into(),
        }
    }

    /// Instance directory holding every file of the sweep
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Common prefix of all files of one (instance, sample)
    pub fn sample_base(&self, instance: &InstanceKey, sample: u32) -> PathBuf {
        let width = SAMPLE_ENCODING_WIDTH;
        self.dir.join(format!(
            "{}-{}#{:0width$}",
            self.family,
            instance.encode(),
            sample
        ))
    }

    /// Compressed matrix produced by the generator
    pub fn artifact_path(&self, instance: &InstanceKey, sample: u32) -> PathBuf {
        with_suffix(&self.sample_base(instance, sample), ARTIFACT_EXTENSION)
    }

    /// Prefix of the trial's log files, also handed to commands as `{file_base}`
    pub fn trial_base(&self, spec: &TrialSpec) -> PathBuf {
        let base = self.sample_base(&spec.instance, spec.sample);
        let mut name = base.into_os_string();
        name.push(format!("-{}", spec.algorithm.name()));
        PathBuf::from(name)
    }

    /// Captured standard output of a trial
    pub fn stdout_path(&self, spec: &TrialSpec) -> PathBuf {
        with_suffix(&self.trial_base(spec), STDOUT_EXTENSION)
    }

    /// Captured standard error of a trial
    pub fn stderr_path(&self, spec: &TrialSpec) -> PathBuf {
        with_suffix(&self.trial_base(spec), STDERR_EXTENSION)
    }
}

/// `path` + `.suffix`, keeping any dots already in the file name
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Temporary name used while a file is still being written
pub fn partial_path(path: &Path) -> PathBuf {
    with_suffix(path, PARTIAL_SUFFIX)
}
