//! Algorithm tags and their log parsing rules

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::markers;
use crate::models::command::{AlgorithmCommand, PipelineTemplate, StageTemplate};

static PARTITION_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(markers::PARTITION_TIME).expect("valid partition regex"));
static EULERIAN_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(markers::EULERIAN_TIME).expect("valid eulerian regex"));
static DECOMPOSITION_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(markers::DECOMPOSITION_TIME).expect("valid decomposition regex"));
static TOTAL_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(markers::TOTAL_TIME).expect("valid total time regex"));

/// Solver or mode under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// `cmr-tu` using the Seymour decomposition
    CmrDec,
    /// `cmr-tu` using the partition-based test
    CmrPart,
    /// `cmr-tu` enumerating Eulerian submatrices
    CmrEuler,
    /// `cmr-tu` decomposition that also produces a violating submatrix
    CmrCert,
    /// External unimodularity test
    Unimod,
    /// External unimodularity test, certificate variant
    UnimodCert,
}

/// How the timing of an algorithm is extracted from its logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// Timing on standard error, invalidated by a time-limit marker
    Solver,
    /// Timing on standard output, no cancellation concept
    Reference,
}

/// Which captured stream a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Standard output (`.out`)
    Primary,
    /// Standard error (`.err`)
    Secondary,
}

/// Parsing rule descriptor attached to every algorithm tag
#[derive(Debug, Clone, Copy)]
pub struct ParseRule {
    pub stream: LogStream,
    /// First capture group holds the elapsed seconds
    pub timing: &'static Regex,
    /// Whether a time-limit marker on the stream invalidates the trial
    pub cancellable: bool,
}

impl Algorithm {
    /// All algorithm tags
    pub const ALL: &'static [Algorithm] = &[
        Algorithm::CmrDec,
        Algorithm::CmrPart,
        Algorithm::CmrEuler,
        Algorithm::CmrCert,
        Algorithm::Unimod,
        Algorithm::UnimodCert,
    ];

    /// Short name used in file names and reports
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::CmrDec => "cmrdec",
            Algorithm::CmrPart => "cmrpart",
            Algorithm::CmrEuler => "cmreuler",
            Algorithm::CmrCert => "cmrcert",
            Algorithm::Unimod => "unimod",
            Algorithm::UnimodCert => "unimodcert",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Algorithm::CmrDec | Algorithm::CmrPart | Algorithm::CmrEuler | Algorithm::CmrCert => {
                AlgorithmFamily::Solver
            }
            Algorithm::Unimod | Algorithm::UnimodCert => AlgorithmFamily::Reference,
        }
    }

    pub fn parse_rule(&self) -> ParseRule {
        match self {
            Algorithm::CmrPart => ParseRule {
                stream: LogStream::Secondary,
                timing: &PARTITION_TIME_RE,
                cancellable: true,
            },
            Algorithm::CmrEuler => ParseRule {
                stream: LogStream::Secondary,
                timing: &EULERIAN_TIME_RE,
                cancellable: true,
            },
            Algorithm::CmrDec | Algorithm::CmrCert => ParseRule {
                stream: LogStream::Secondary,
                timing: &DECOMPOSITION_TIME_RE,
                cancellable: true,
            },
            Algorithm::Unimod | Algorithm::UnimodCert => ParseRule {
                stream: LogStream::Primary,
                timing: &TOTAL_TIME_RE,
                cancellable: false,
            },
        }
    }

    /// Whether near-timeout measurements are censored before aggregation
    pub fn is_censored(&self) -> bool {
        self.family() == AlgorithmFamily::Reference
    }

    /// Command used when a sweep does not override it
    pub fn default_command(&self) -> AlgorithmCommand {
        match self {
            Algorithm::CmrDec => cmr_tu_command("decomposition", &[]),
            Algorithm::CmrPart => cmr_tu_command("partition", &[]),
            Algorithm::CmrEuler => cmr_tu_command("eulerian", &[]),
            Algorithm::CmrCert => cmr_tu_command("decomposition", &["-N", "{file_base}.sub"]),
            Algorithm::Unimod | Algorithm::UnimodCert => unimodularity_test_command(),
        }
    }
}

fn decompress_input() -> StageTemplate {
    StageTemplate::new("gunzip", &["-cd", "{input}"])
}

fn cmr_tu_command(algo: &str, extra: &[&str]) -> AlgorithmCommand {
    let mut args = vec![
        "-", "-i", "sparse", "--stats", "--algo", algo, "--time-limit", "{time_limit}",
    ];
    args.extend_from_slice(extra);

    AlgorithmCommand {
        prepare: Vec::new(),
        run: PipelineTemplate::new(vec![
            decompress_input(),
            StageTemplate::new("{build_dir}/cmr-tu", &args),
        ]),
    }
}

fn unimodularity_test_command() -> AlgorithmCommand {
    let tool = "{unimod_dir}/unimodularity-test";
    AlgorithmCommand {
        prepare: vec![
            PipelineTemplate::new(vec![
                decompress_input(),
                StageTemplate::new(
                    "{build_dir}/cmr-matrix",
                    &["-", "-i", "sparse", "-o", "dense", "{scratch}/input.dense"],
                ),
            ]),
            PipelineTemplate::new(vec![
                StageTemplate::new(tool, &["{scratch}/input.dense", "-s"]),
                StageTemplate::new("grep", &["-E", "^[ 0-9-]*$"]),
            ])
            .with_stdout("{scratch}/signed.dense"),
        ],
        run: PipelineTemplate::new(vec![StageTemplate::new(
            tool,
            &["{scratch}/signed.dense", "-t", "-v"],
        )]),
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown algorithm '{}'", s))
    }
}
