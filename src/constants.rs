//! Application-wide constants
//!
//! This module contains all constant values used throughout the benchmark
//! pipeline. Constants are grouped by their purpose for better organization.

// =============================================================================
// ENVIRONMENT DEFAULTS
// =============================================================================

/// Default directory holding the `cmr-*` executables
pub const DEFAULT_BUILD_DIR: &str = "../build-release";

/// Default directory holding the `unimodularity-test` executable
pub const DEFAULT_UNIMOD_DIR: &str = "unimodularity-test/src";

/// Default root under which instance directories are created
pub const DEFAULT_BENCH_ROOT: &str = ".";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "cmrbench=info";

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Time limit handed to the solvers, in seconds
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 3600;

/// Reference-test times at or above this many seconds are censored to infinity.
///
/// Kept separate from [`DEFAULT_TIME_LIMIT_SECS`]; the two are configured
/// independently.
pub const DEFAULT_CENSOR_CEILING_SECS: f64 = 3700.0;

/// Extra wall-clock seconds granted before a running pipeline is killed
pub const DEFAULT_KILL_GRACE_SECS: u64 = 300;

/// Wall-clock limit for a single generator invocation, in seconds
pub const DEFAULT_GENERATOR_TIME_LIMIT_SECS: u64 = 3600;

// =============================================================================
// ARTIFACT NAMING
// =============================================================================

/// Zero-padded width of the matrix order in artifact names
pub const SIZE_ENCODING_WIDTH: usize = 5;

/// Zero-padded width of the sample index in artifact names
pub const SAMPLE_ENCODING_WIDTH: usize = 3;

/// Suffix of compressed matrix artifacts
pub const ARTIFACT_EXTENSION: &str = "sparse.gz";

/// Suffix of captured standard output
pub const STDOUT_EXTENSION: &str = "out";

/// Suffix of captured standard error
pub const STDERR_EXTENSION: &str = "err";

/// Suffix appended while a file is still being written
pub const PARTIAL_SUFFIX: &str = "part";

/// Prefix of the per-invocation scratch directory
pub const SCRATCH_PREFIX: &str = "cmrbench-";

// =============================================================================
// LOG MARKERS
// =============================================================================

/// Log line patterns printed by the external tools
pub mod markers {
    /// Printed by `cmr-tu` on standard error when its time limit expires
    pub const TIME_LIMIT_EXCEEDED: &str = "Time limit exceeded!";

    /// Partition-based test timing line
    pub const PARTITION_TIME: &str = r"^  partition time: ([0-9.]*)( seconds|)";

    /// Eulerian enumeration timing line
    pub const EULERIAN_TIME: &str = r"^  eulerian enumeration time: ([0-9.]*)( seconds|)";

    /// Total decomposition timing line, shared by the plain and certifying runs
    pub const DECOMPOSITION_TIME: &str = r"^  seymour total: [0-9]* in ([0-9.]*)( seconds|)";

    /// Reference tool timing line
    pub const TOTAL_TIME: &str = r"^Total time: ([0-9.]*)";
}

// =============================================================================
// TEMPLATE PLACEHOLDERS
// =============================================================================

/// Placeholder names accepted in command templates
pub mod placeholders {
    pub const BUILD_DIR: &str = "build_dir";
    pub const UNIMOD_DIR: &str = "unimod_dir";
    pub const SCRATCH: &str = "scratch";
    pub const INPUT: &str = "input";
    pub const FILE_BASE: &str = "file_base";
    pub const TIME_LIMIT: &str = "time_limit";
    pub const SIZE: &str = "size";
    pub const SIZE_DIV2: &str = "size_div2";
    pub const SIZE_DIV2_PLUS1: &str = "size_div2_plus1";
    pub const DENSITY: &str = "density";
    pub const SAMPLE: &str = "sample";

    /// All known placeholder names
    pub const ALL: &[&str] = &[
        BUILD_DIR,
        UNIMOD_DIR,
        SCRATCH,
        INPUT,
        FILE_BASE,
        TIME_LIMIT,
        SIZE,
        SIZE_DIV2,
        SIZE_DIV2_PLUS1,
        DENSITY,
        SAMPLE,
    ];
}
