//! Sweep driver
//!
//! Enumerates (instance, algorithm, sample) triples of one sweep and drives
//! generation, execution and evaluation over them. Everything is sequential;
//! each pipeline finishes before the next one starts.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::time::Duration;

use super::executor::{ProcessLauncher, RunOutcome};
use super::generator::{GenerateStatus, InstanceGenerator};
use super::layout::ArtifactLayout;
use super::metrics::{aggregate_store, censor};
use super::parser::LogParser;
use super::runner::{TrialRunStatus, TrialRunner};
use super::scratch::ScratchSpace;
use super::store::ResultStore;
use crate::config::{AlgorithmEntry, Config, ConfigError, SweepConfig};
use crate::constants::placeholders;
use crate::error::{BenchError, BenchResult};
use crate::models::command;
use crate::models::{Algorithm, InstanceKey, Trial, TrialOutcome, TrialSpec};

/// Phase(s) of a sweep to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Run,
    Eval,
    All,
}

/// Counters of a generation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerateTally {
    pub generated: usize,
    pub present: usize,
    pub failed: usize,
}

/// Counters of an execution pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTally {
    pub executed: usize,
    pub killed: usize,
    pub complete: usize,
    pub skipped: usize,
    pub missing_input: usize,
    pub failed_preparation: usize,
}

impl RunTally {
    fn record(&mut self, status: TrialRunStatus) {
        match status {
            TrialRunStatus::Executed(RunOutcome::Killed) => {
                self.executed += 1;
                self.killed += 1;
            }
            TrialRunStatus::Executed(_) => self.executed += 1,
            TrialRunStatus::PreparationFailed(_) => {
                self.executed += 1;
                self.failed_preparation += 1;
            }
            TrialRunStatus::AlreadyComplete => self.complete += 1,
            TrialRunStatus::SkippedBySize => self.skipped += 1,
            TrialRunStatus::MissingInput => self.missing_input += 1,
        }
    }
}

/// Counters of an evaluation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvalTally {
    pub parsed: usize,
    pub unfinished: usize,
    pub skipped: usize,
}

impl EvalTally {
    fn record(&mut self, outcome: TrialOutcome) {
        self.parsed += 1;
        if outcome.is_unfinished() {
            self.unfinished += 1;
        }
        if outcome == TrialOutcome::Skipped {
            self.skipped += 1;
        }
    }
}

/// Which enumeration boundaries a trial crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
    instance: bool,
    algorithm: bool,
}

/// Follows the enumeration to log progress per instance and per algorithm
#[derive(Debug, Default)]
struct Progress {
    instance: Option<InstanceKey>,
    algorithm: Option<Algorithm>,
}

impl Progress {
    fn advance(&mut self, spec: &TrialSpec) -> Boundary {
        let instance = self.instance != Some(spec.instance);
        let algorithm = instance || self.algorithm != Some(spec.algorithm);
        self.instance = Some(spec.instance);
        self.algorithm = Some(spec.algorithm);
        Boundary { instance, algorithm }
    }

    fn log(&mut self, phase: &str, sweep: &str, spec: &TrialSpec) {
        let boundary = self.advance(spec);
        if boundary.instance {
            tracing::info!(phase, sweep, instance = %spec.instance, "Starting instance");
        }
        if boundary.algorithm {
            tracing::info!(
                phase,
                sweep,
                instance = %spec.instance,
                algorithm = %spec.algorithm,
                "Starting algorithm"
            );
        }
    }
}

/// Drives one sweep
pub struct SweepDriver {
    sweep: SweepConfig,
    config: Config,
    samples: u32,
    layout: ArtifactLayout,
    launcher: Arc<dyn ProcessLauncher>,
}

impl SweepDriver {
    /// Validate the sweep and fix its instance order
    pub fn new(
        mut sweep: SweepConfig,
        config: Config,
        samples: u32,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> BenchResult<Self> {
        if samples == 0 {
            return Err(ConfigError::Invalid("sample count must be positive".to_string()).into());
        }
        sweep.check()?;
        sweep.instances.sort();
        sweep.instances.dedup();

        let layout = ArtifactLayout::new(
            config.storage.bench_root.join(&sweep.instance_dir),
            sweep.family.clone(),
        );

        Ok(Self {
            sweep,
            config,
            samples,
            layout,
            launcher,
        })
    }

    pub fn instances(&self) -> &[InstanceKey] {
        &self.sweep.instances
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Every trial of the sweep in enumeration order: instances ascending,
    /// algorithms as declared, samples ascending
    pub fn trials(&self) -> impl Iterator<Item = (TrialSpec, &AlgorithmEntry)> + '_ {
        self.sweep.instances.iter().flat_map(move |instance| {
            self.sweep.algorithms.iter().flat_map(move |entry| {
                (1..=self.samples)
                    .map(move |sample| (TrialSpec::new(*instance, entry.algorithm, sample), entry))
            })
        })
    }

    /// Perform the requested phases; evaluation returns the summaries
    pub async fn execute(&self, mode: Mode) -> BenchResult<Vec<Trial>> {
        match mode {
            Mode::Generate => {
                self.generate().await?;
                Ok(Vec::new())
            }
            Mode::Run => {
                self.run().await?;
                Ok(Vec::new())
            }
            Mode::Eval => self.evaluate().await,
            Mode::All => {
                self.generate().await?;
                self.run().await?;
                self.evaluate().await
            }
        }
    }

    /// Generate every missing (instance, sample) artifact
    pub async fn generate(&self) -> BenchResult<GenerateTally> {
        self.validate_environment(self.sweep.generator.templates())?;
        self.prepare_instance_dir().await?;

        let generator = InstanceGenerator::new(
            self.launcher.clone(),
            self.layout.clone(),
            self.config.tools.clone(),
            self.sweep.generator.clone(),
            Duration::from_secs(self.config.execution.generator_time_limit_secs),
        );

        let mut tally = GenerateTally::default();
        for instance in &self.sweep.instances {
            tracing::info!(sweep = %self.sweep.name, instance = %instance, "Generating instance samples");
            for sample in 1..=self.samples {
                match generator.generate(instance, sample).await? {
                    GenerateStatus::Generated => tally.generated += 1,
                    GenerateStatus::AlreadyPresent => tally.present += 1,
                    GenerateStatus::Failed(_) => tally.failed += 1,
                }
            }
        }

        tracing::info!(
            sweep = %self.sweep.name,
            generated = tally.generated,
            present = tally.present,
            failed = tally.failed,
            "Generation finished"
        );
        Ok(tally)
    }

    /// Run every trial that is not complete yet
    pub async fn run(&self) -> BenchResult<RunTally> {
        let commands: Vec<_> = self
            .sweep
            .algorithms
            .iter()
            .map(|entry| (entry.algorithm, self.sweep.command_for(entry.algorithm)))
            .collect();
        self.validate_environment(commands.iter().flat_map(|(_, c)| c.templates()))?;
        self.prepare_instance_dir().await?;

        // Removed on every exit path, including errors
        let scratch = ScratchSpace::create(&self.config.storage.scratch_root)?;

        let runner = TrialRunner::new(
            self.launcher.clone(),
            self.layout.clone(),
            self.config.tools.clone(),
            self.sweep.time_limit_secs,
            self.config.execution.kill_grace_secs,
        );

        let mut tally = RunTally::default();
        let mut progress = Progress::default();
        for (spec, entry) in self.trials() {
            progress.log("run", &self.sweep.name, &spec);
            let command = commands
                .iter()
                .find(|(algorithm, _)| *algorithm == spec.algorithm)
                .map(|(_, command)| command)
                .ok_or_else(|| BenchError::Process(format!("no command for {}", spec.algorithm)))?;

            let status = runner.run(spec, entry, command, scratch.path()).await?;
            tracing::info!(trial = %spec, status = ?status, "Trial processed");
            tally.record(status);
        }

        tracing::info!(
            sweep = %self.sweep.name,
            executed = tally.executed,
            killed = tally.killed,
            complete = tally.complete,
            skipped = tally.skipped,
            missing_input = tally.missing_input,
            failed_preparation = tally.failed_preparation,
            "Run finished"
        );
        Ok(tally)
    }

    /// Parse all logs, censor reference timings and aggregate per key
    pub async fn evaluate(&self) -> BenchResult<Vec<Trial>> {
        let (store, tally) = self.collect().await;
        let summaries = aggregate_store(&store)?;
        tracing::info!(
            sweep = %self.sweep.name,
            parsed = tally.parsed,
            unfinished = tally.unfinished,
            skipped = tally.skipped,
            summaries = summaries.len(),
            "Evaluation finished"
        );
        Ok(summaries)
    }

    /// Parse every trial into a store; reference trials are censored before
    /// they are stored
    async fn collect(&self) -> (ResultStore, EvalTally) {
        let parser = LogParser::new(self.layout.clone());
        let ceiling = self.sweep.censor_ceiling_secs;
        let mut store = ResultStore::new();
        let mut tally = EvalTally::default();
        let mut progress = Progress::default();

        for (spec, entry) in self.trials() {
            progress.log("eval", &self.sweep.name, &spec);
            let mut trial = if entry.applies_to(&spec.instance) {
                parser.parse(spec).await
            } else {
                Trial::skipped(spec)
            };
            if spec.algorithm.is_censored() {
                censor(&mut trial, ceiling);
            }
            tracing::info!(trial = %trial, outcome = trial.outcome.code(), "Parsed trial");
            tally.record(trial.outcome);
            store.append(trial);
        }
        (store, tally)
    }

    /// Check that every tool directory the templates refer to exists
    fn validate_environment<'a>(&self, templates: impl Iterator<Item = &'a str>) -> BenchResult<()> {
        let mut needs_build = false;
        let mut needs_unimod = false;
        for template in templates {
            for name in command::placeholders(template) {
                needs_build |= name == placeholders::BUILD_DIR;
                needs_unimod |= name == placeholders::UNIMOD_DIR;
            }
        }

        let tools = &self.config.tools;
        if needs_build {
            require_dir("CMR_BUILD_DIR", &tools.build_dir)?;
        }
        if needs_unimod {
            require_dir("UNIMOD_DIR", &tools.unimod_dir)?;
        }
        Ok(())
    }

    async fn prepare_instance_dir(&self) -> BenchResult<()> {
        let dir = self.layout.dir();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| BenchError::io(dir, e))
    }
}

fn require_dir(variable: &str, path: &Path) -> BenchResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(BenchError::Environment(format!(
            "{} points to '{}', which is not a directory",
            variable,
            path.display()
        )))
    }
}
