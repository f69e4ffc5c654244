//! Command pipeline templates
//!
//! A pipeline is a chain of stages whose standard output feeds the next
//! stage's standard input, like a shell `a | b | c`. Arguments may contain
//! `{placeholder}` references that are substituted per trial.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("valid placeholder regex"));

/// One program invocation inside a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl StageTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A chain of stages with optional redirection of the last stage's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTemplate {
    pub stages: Vec<StageTemplate>,
    /// File receiving the last stage's standard output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// File receiving the last stage's standard error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl PipelineTemplate {
    pub fn new(stages: Vec<StageTemplate>) -> Self {
        Self {
            stages,
            stdout: None,
            stderr: None,
        }
    }

    pub fn with_stdout(mut self, path: impl Into<String>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Every template string of this pipeline
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|s| std::iter::once(s.program.as_str()).chain(s.args.iter().map(String::as_str)))
            .chain(self.stdout.as_deref())
            .chain(self.stderr.as_deref())
    }
}

/// Full command description of one algorithm.
///
/// The `prepare` pipelines run first (format conversion and the like); only
/// the `run` pipeline is the measured trial, and its output is captured to
/// the trial's log files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmCommand {
    #[serde(default)]
    pub prepare: Vec<PipelineTemplate>,
    pub run: PipelineTemplate,
}

impl AlgorithmCommand {
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.prepare
            .iter()
            .flat_map(PipelineTemplate::templates)
            .chain(self.run.templates())
    }
}

/// Values substituted into templates
pub type TemplateVars = BTreeMap<&'static str, String>;

/// Substitute `{name}` references. Unknown names are left untouched.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of all placeholders referenced by a template
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
