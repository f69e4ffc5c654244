//! Configuration management
//!
//! Two layers of configuration exist:
//! - [`Config`]: the machine environment (tool locations, storage roots,
//!   limits), loaded from environment variables and an optional `.env` file.
//! - [`SweepConfig`]: one benchmark sweep (instances, algorithms, commands),
//!   either a built-in preset or a JSON file. Every sweep is validated before
//!   it is run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::{
    placeholders, DEFAULT_BENCH_ROOT, DEFAULT_BUILD_DIR, DEFAULT_CENSOR_CEILING_SECS,
    DEFAULT_GENERATOR_TIME_LIMIT_SECS, DEFAULT_KILL_GRACE_SECS, DEFAULT_LOG_FILTER,
    DEFAULT_TIME_LIMIT_SECS, DEFAULT_UNIMOD_DIR,
};
use crate::models::command::{self, AlgorithmCommand, PipelineTemplate};
use crate::models::{Algorithm, InstanceKey};

/// Environment configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tools: ToolConfig,
    pub storage: StorageConfig,
    pub execution: ExecutionConfig,
    pub rust_log: String,
}

/// Locations of the external executables
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Directory with `cmr-tu`, `cmr-matrix` and the generators
    pub build_dir: PathBuf,
    /// Directory with `unimodularity-test`
    pub unimod_dir: PathBuf,
}

/// File storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Instance directories are created below this path
    pub bench_root: PathBuf,
    /// Per-invocation scratch directories are created below this path
    pub scratch_root: PathBuf,
}

/// Process supervision limits
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Seconds granted beyond the solver time limit before a kill
    pub kill_grace_secs: u64,
    /// Wall-clock limit of one generator pipeline
    pub generator_time_limit_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            tools: ToolConfig::from_env(),
            storage: StorageConfig::from_env(),
            execution: ExecutionConfig::from_env()?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

impl ToolConfig {
    fn from_env() -> Self {
        Self {
            build_dir: PathBuf::from(
                env::var("CMR_BUILD_DIR").unwrap_or_else(|_| DEFAULT_BUILD_DIR.to_string()),
            ),
            unimod_dir: PathBuf::from(
                env::var("UNIMOD_DIR").unwrap_or_else(|_| DEFAULT_UNIMOD_DIR.to_string()),
            ),
        }
    }
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            bench_root: PathBuf::from(
                env::var("BENCH_ROOT").unwrap_or_else(|_| DEFAULT_BENCH_ROOT.to_string()),
            ),
            scratch_root: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
        }
    }
}

impl ExecutionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            kill_grace_secs: env::var("KILL_GRACE_SECS")
                .unwrap_or_else(|_| DEFAULT_KILL_GRACE_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KILL_GRACE_SECS".to_string()))?,
            generator_time_limit_secs: env::var("GENERATOR_TIME_LIMIT_SECS")
                .unwrap_or_else(|_| DEFAULT_GENERATOR_TIME_LIMIT_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GENERATOR_TIME_LIMIT_SECS".to_string()))?,
        })
    }
}

/// One algorithm of a sweep with its optional size threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AlgorithmEntry {
    pub algorithm: Algorithm,
    /// Instances larger than this are never run with this algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub max_size: Option<u32>,
}

impl AlgorithmEntry {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            max_size: None,
        }
    }

    pub fn limited(algorithm: Algorithm, max_size: u32) -> Self {
        Self {
            algorithm,
            max_size: Some(max_size),
        }
    }

    /// Whether the algorithm should run on an instance
    pub fn applies_to(&self, instance: &InstanceKey) -> bool {
        self.max_size.is_none_or(|max| instance.size <= max)
    }
}

/// Definition of one benchmark sweep
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SweepConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// File name prefix of every artifact, e.g. `modwheel`
    #[validate(length(min = 1))]
    pub family: String,

    /// Directory below the bench root holding all artifacts of the sweep
    #[validate(length(min = 1))]
    pub instance_dir: String,

    #[validate(length(min = 1))]
    pub instances: Vec<InstanceKey>,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub algorithms: Vec<AlgorithmEntry>,

    /// Pipeline whose standard output becomes the compressed matrix
    pub generator: PipelineTemplate,

    /// Per-algorithm overrides of [`Algorithm::default_command`]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<Algorithm, AlgorithmCommand>,

    #[serde(default = "default_time_limit_secs")]
    #[validate(range(min = 1))]
    pub time_limit_secs: u64,

    #[serde(default = "default_censor_ceiling_secs")]
    #[validate(range(min = 0.0))]
    pub censor_ceiling_secs: f64,
}

fn default_time_limit_secs() -> u64 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_censor_ceiling_secs() -> f64 {
    DEFAULT_CENSOR_CEILING_SECS
}

impl SweepConfig {
    /// Read and validate a sweep definition from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let sweep: SweepConfig = serde_json::from_str(&content)?;
        sweep.check()?;
        Ok(sweep)
    }

    /// Command used for an algorithm in this sweep
    pub fn command_for(&self, algorithm: Algorithm) -> AlgorithmCommand {
        self.commands
            .get(&algorithm)
            .cloned()
            .unwrap_or_else(|| algorithm.default_command())
    }

    /// Field validation plus the cross-field rules the derive cannot express
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.algorithms {
            if !seen.insert(entry.algorithm) {
                return Err(ConfigError::Invalid(format!(
                    "algorithm '{}' listed twice in sweep '{}'",
                    entry.algorithm, self.name
                )));
            }
        }

        let mut encodings: HashMap<String, InstanceKey> = HashMap::new();
        for instance in &self.instances {
            let encoded = instance.encode();
            match encodings.get(&encoded) {
                Some(existing) if existing != instance => {
                    return Err(ConfigError::Invalid(format!(
                        "instances {} and {} of sweep '{}' share the file name '{}'",
                        existing, instance, self.name, encoded
                    )));
                }
                _ => {
                    encodings.insert(encoded, *instance);
                }
            }
        }

        check_pipeline("generator", &self.generator)?;
        for entry in &self.algorithms {
            let command = self.command_for(entry.algorithm);
            for pipeline in command.prepare.iter().chain(std::iter::once(&command.run)) {
                check_pipeline(entry.algorithm.name(), pipeline)?;
            }
        }

        Ok(())
    }
}

fn check_pipeline(owner: &str, pipeline: &PipelineTemplate) -> Result<(), ConfigError> {
    if pipeline.stages.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "pipeline of '{}' has no stages",
            owner
        )));
    }
    for template in pipeline.templates() {
        for name in command::placeholders(template) {
            if !placeholders::ALL.contains(&name) {
                return Err(ConfigError::Invalid(format!(
                    "unknown placeholder '{{{}}}' in '{}' of '{}'",
                    name, template, owner
                )));
            }
        }
    }
    Ok(())
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("Invalid sweep configuration: {0}")]
    Invalid(String),

    #[error("Unknown sweep '{0}'")]
    UnknownSweep(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse sweep file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Invalid(errors.to_string())
    }
}
