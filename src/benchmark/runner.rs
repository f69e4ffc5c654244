//! Trial runner - executes one solver invocation per trial
//!
//! A trial is complete once its `.out` file exists. Both log files are
//! written under a `.part` name and renamed after the pipeline ends, so an
//! interrupted sweep never leaves a half-written `.out` behind and a later
//! pass simply picks up where the previous one stopped.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::time::Duration;

use super::executor::{Pipeline, ProcessLauncher, RunOutcome};
use super::layout::{partial_path, ArtifactLayout};
use super::scratch::ScratchSpace;
use crate::config::{AlgorithmEntry, ToolConfig};
use crate::constants::placeholders;
use crate::error::{BenchError, BenchResult};
use crate::models::{AlgorithmCommand, InstanceKey, TemplateVars, TrialSpec};

/// What happened to a trial on this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialRunStatus {
    /// The measured pipeline ran and its logs are in place
    Executed(RunOutcome),
    /// Logs from an earlier pass exist
    AlreadyComplete,
    /// The instance is above the algorithm's size threshold
    SkippedBySize,
    /// The input matrix has not been generated
    MissingInput,
    /// A preparation pipeline failed; empty logs were written instead
    PreparationFailed(RunOutcome),
}

/// Placeholder values describing one (instance, sample)
pub fn instance_vars(tools: &ToolConfig, instance: &InstanceKey, sample: u32) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert(placeholders::BUILD_DIR, tools.build_dir.display().to_string());
    vars.insert(placeholders::UNIMOD_DIR, tools.unimod_dir.display().to_string());
    vars.insert(placeholders::SIZE, instance.size.to_string());
    vars.insert(placeholders::SIZE_DIV2, (instance.size / 2).to_string());
    vars.insert(placeholders::SIZE_DIV2_PLUS1, (instance.size / 2 + 1).to_string());
    vars.insert(placeholders::SAMPLE, sample.to_string());
    // Left unresolved for instances without a density
    if let Some(density) = instance.density {
        vars.insert(placeholders::DENSITY, density.to_string());
    }
    vars
}

/// Runs trials of one sweep
pub struct TrialRunner {
    launcher: Arc<dyn ProcessLauncher>,
    layout: ArtifactLayout,
    tools: ToolConfig,
    time_limit_secs: u64,
    kill_grace_secs: u64,
}

impl TrialRunner {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        layout: ArtifactLayout,
        tools: ToolConfig,
        time_limit_secs: u64,
        kill_grace_secs: u64,
    ) -> Self {
        Self {
            launcher,
            layout,
            tools,
            time_limit_secs,
            kill_grace_secs,
        }
    }

    /// Wall-clock budget of a single pipeline
    pub fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs + self.kill_grace_secs)
    }

    /// Run one trial unless it is skipped, done already or lacks its input.
    ///
    /// `scratch_root` is the sweep's scratch directory; every trial works in
    /// a fresh subdirectory of it that is removed when the trial ends.
    pub async fn run(
        &self,
        spec: TrialSpec,
        entry: &AlgorithmEntry,
        command: &AlgorithmCommand,
        scratch_root: &Path,
    ) -> BenchResult<TrialRunStatus> {
        if !entry.applies_to(&spec.instance) {
            tracing::debug!(trial = %spec, max_size = ?entry.max_size, "Skipping trial above size threshold");
            return Ok(TrialRunStatus::SkippedBySize);
        }

        let stdout = self.layout.stdout_path(&spec);
        if stdout.exists() {
            tracing::debug!(trial = %spec, "Trial already complete");
            return Ok(TrialRunStatus::AlreadyComplete);
        }

        let input = self.layout.artifact_path(&spec.instance, spec.sample);
        if !input.exists() {
            tracing::warn!(trial = %spec, input = %input.display(), "Input matrix missing, trial not run");
            return Ok(TrialRunStatus::MissingInput);
        }

        let scratch = ScratchSpace::create(scratch_root)?;
        let vars = self.trial_vars(&spec, &input, scratch.path());
        let limit = self.hard_limit();

        let stderr = self.layout.stderr_path(&spec);
        let stdout_part = partial_path(&stdout);
        let stderr_part = partial_path(&stderr);

        for template in &command.prepare {
            let pipeline = Pipeline::render(template, &vars);
            let outcome = self.launcher.run_pipeline(&pipeline, limit).await?;
            if !outcome.is_success() {
                tracing::warn!(
                    trial = %spec,
                    pipeline = %pipeline,
                    outcome = ?outcome,
                    "Preparation step failed, measured run skipped"
                );
                // Empty logs: complete, but without a timing
                for path in [&stdout_part, &stderr_part] {
                    fs::write(path, b"").await.map_err(|e| BenchError::io(path, e))?;
                }
                self.publish_logs(&spec).await?;
                return Ok(TrialRunStatus::PreparationFailed(outcome));
            }
        }

        let pipeline =
            Pipeline::render(&command.run, &vars).redirect(stdout_part, stderr_part);

        tracing::info!(trial = %spec, "Running trial");
        let outcome = self.launcher.run_pipeline(&pipeline, limit).await?;

        match outcome {
            RunOutcome::Completed { exit_code: Some(0) } => {}
            RunOutcome::Completed { exit_code } => {
                tracing::warn!(trial = %spec, exit_code = ?exit_code, "Trial exited unsuccessfully");
            }
            RunOutcome::Killed => {
                tracing::warn!(trial = %spec, limit_secs = limit.as_secs(), "Trial killed at wall-clock limit");
            }
        }

        self.publish_logs(&spec).await?;
        Ok(TrialRunStatus::Executed(outcome))
    }

    /// Move both `.part` logs to their final names, `.out` last since its
    /// presence marks the trial complete
    async fn publish_logs(&self, spec: &TrialSpec) -> BenchResult<()> {
        for path in [self.layout.stderr_path(spec), self.layout.stdout_path(spec)] {
            let partial = partial_path(&path);
            fs::rename(&partial, &path)
                .await
                .map_err(|e| BenchError::io(&partial, e))?;
        }
        Ok(())
    }

    fn trial_vars(&self, spec: &TrialSpec, input: &Path, scratch: &Path) -> TemplateVars {
        let mut vars = instance_vars(&self.tools, &spec.instance, spec.sample);
        vars.insert(placeholders::SCRATCH, scratch.display().to_string());
        vars.insert(placeholders::INPUT, input.display().to_string());
        vars.insert(
            placeholders::FILE_BASE,
            self.layout.trial_base(spec).display().to_string(),
        );
        vars.insert(placeholders::TIME_LIMIT, self.time_limit_secs.to_string());
        vars
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::benchmark::executor::{MockProcessLauncher, SystemLauncher};
    use crate::benchmark::parser::LogParser;
    use crate::models::{Algorithm, Density, PipelineTemplate, StageTemplate, TrialOutcome};

    fn tools() -> ToolConfig {
        ToolConfig {
            build_dir: PathBuf::from("/opt/cmr"),
            unimod_dir: PathBuf::from("/opt/unimod"),
        }
    }

    fn runner(launcher: MockProcessLauncher, dir: &Path) -> TrialRunner {
        TrialRunner::new(
            Arc::new(launcher),
            ArtifactLayout::new(dir, "modwheel"),
            tools(),
            3600,
            300,
        )
    }

    /// Mock that writes the redirected logs like a real launcher would
    fn writing_launcher(calls: usize, stderr: &'static str) -> MockProcessLauncher {
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_run_pipeline()
            .times(calls)
            .returning(move |pipeline, _| {
                if let Some(path) = &pipeline.stdout {
                    std::fs::write(path, "").unwrap();
                }
                if let Some(path) = &pipeline.stderr {
                    std::fs::write(path, stderr).unwrap();
                }
                Ok(RunOutcome::Completed { exit_code: Some(0) })
            });
        launcher
    }

    fn touch_input(layout: &ArtifactLayout, spec: &TrialSpec) {
        std::fs::write(layout.artifact_path(&spec.instance, spec.sample), "").unwrap();
    }

    #[test]
    fn test_instance_vars() {
        let density = Density::try_from(0.3).unwrap();
        let vars = instance_vars(&tools(), &InstanceKey::with_density(99, density), 4);
        assert_eq!(vars["size"], "99");
        assert_eq!(vars["size_div2"], "49");
        assert_eq!(vars["size_div2_plus1"], "50");
        assert_eq!(vars["density"], "0.30");
        assert_eq!(vars["sample"], "4");
        assert!(!instance_vars(&tools(), &InstanceKey::new(9), 1).contains_key("density"));
    }

    #[tokio::test]
    async fn test_threshold_prevents_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_run_pipeline().never();
        let runner = runner(launcher, dir.path());

        let spec = TrialSpec::new(InstanceKey::new(51), Algorithm::CmrPart, 1);
        let entry = AlgorithmEntry::limited(Algorithm::CmrPart, 50);
        let status = runner
            .run(spec, &entry, &Algorithm::CmrPart.default_command(), dir.path())
            .await
            .unwrap();

        assert_eq!(status, TrialRunStatus::SkippedBySize);
    }

    #[tokio::test]
    async fn test_existing_output_is_not_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_run_pipeline().never();
        let runner = runner(launcher, dir.path());

        let spec = TrialSpec::new(InstanceKey::new(19), Algorithm::CmrDec, 2);
        touch_input(&runner.layout, &spec);
        std::fs::write(runner.layout.stdout_path(&spec), "").unwrap();

        let status = runner
            .run(
                spec,
                &AlgorithmEntry::new(Algorithm::CmrDec),
                &Algorithm::CmrDec.default_command(),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(status, TrialRunStatus::AlreadyComplete);
    }

    #[tokio::test]
    async fn test_missing_input_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_run_pipeline().never();
        let runner = runner(launcher, dir.path());

        let spec = TrialSpec::new(InstanceKey::new(19), Algorithm::CmrDec, 1);
        let status = runner
            .run(
                spec,
                &AlgorithmEntry::new(Algorithm::CmrDec),
                &Algorithm::CmrDec.default_command(),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(status, TrialRunStatus::MissingInput);
        assert!(!runner.layout.stdout_path(&spec).exists());
        assert!(!runner.layout.stderr_path(&spec).exists());
    }

    #[tokio::test]
    async fn test_logs_are_renamed_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            writing_launcher(1, "  seymour total: 3 in 0.25 seconds\n"),
            dir.path(),
        );

        let spec = TrialSpec::new(InstanceKey::new(19), Algorithm::CmrCert, 1);
        touch_input(&runner.layout, &spec);

        let status = runner
            .run(
                spec,
                &AlgorithmEntry::new(Algorithm::CmrCert),
                &Algorithm::CmrCert.default_command(),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(
            status,
            TrialRunStatus::Executed(RunOutcome::Completed { exit_code: Some(0) })
        );
        let stderr = runner.layout.stderr_path(&spec);
        assert!(runner.layout.stdout_path(&spec).exists());
        assert!(!partial_path(&runner.layout.stdout_path(&spec)).exists());
        assert_eq!(
            std::fs::read_to_string(stderr).unwrap(),
            "  seymour total: 3 in 0.25 seconds\n"
        );
    }

    #[tokio::test]
    async fn test_command_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = MockProcessLauncher::new();
        let expected_input = ArtifactLayout::new(dir.path(), "modwheel")
            .artifact_path(&InstanceKey::new(19), 1)
            .display()
            .to_string();
        launcher
            .expect_run_pipeline()
            .withf(move |pipeline, limit| {
                pipeline.stages[0].args == vec!["-cd".to_string(), expected_input.clone()]
                    && pipeline.stages[1].program == "/opt/cmr/cmr-tu"
                    && pipeline.stages[1].args.ends_with(&["--time-limit".to_string(), "3600".to_string()])
                    && *limit == Duration::from_secs(3900)
            })
            .times(1)
            .returning(|pipeline, _| {
                for path in pipeline.stdout.iter().chain(pipeline.stderr.iter()) {
                    std::fs::write(path, "").unwrap();
                }
                Ok(RunOutcome::Killed)
            });
        let runner = runner(launcher, dir.path());

        let spec = TrialSpec::new(InstanceKey::new(19), Algorithm::CmrEuler, 1);
        touch_input(&runner.layout, &spec);
        let status = runner
            .run(
                spec,
                &AlgorithmEntry::new(Algorithm::CmrEuler),
                &Algorithm::CmrEuler.default_command(),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(status, TrialRunStatus::Executed(RunOutcome::Killed));
        assert!(runner.layout.stdout_path(&spec).exists());
    }

    #[tokio::test]
    async fn test_preparation_uses_a_scratch_per_trial() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_run_pipeline()
            .times(3)
            .returning(move |pipeline, _| {
                if let Some(path) = &pipeline.stdout {
                    std::fs::write(path, "").unwrap();
                    recorded.lock().unwrap().push(path.clone());
                }
                if let Some(path) = &pipeline.stderr {
                    std::fs::write(path, "").unwrap();
                }
                Ok(RunOutcome::Completed { exit_code: Some(0) })
            });
        let runner = runner(launcher, dir.path());

        let spec = TrialSpec::new(InstanceKey::new(9), Algorithm::Unimod, 1);
        touch_input(&runner.layout, &spec);
        let status = runner
            .run(
                spec,
                &AlgorithmEntry::new(Algorithm::Unimod),
                &Algorithm::Unimod.default_command(),
                dir.path(),
            )
            .await
            .unwrap();

        assert!(matches!(status, TrialRunStatus::Executed(_)));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].file_name().unwrap(), "signed.dense");
        let trial_scratch = seen[0].parent().unwrap();
        assert_eq!(trial_scratch.parent().unwrap(), dir.path());
        assert!(!trial_scratch.exists());
    }

    /// Copies a non-empty input into scratch, then reports its content as the time
    fn copying_command() -> AlgorithmCommand {
        AlgorithmCommand {
            prepare: vec![PipelineTemplate::new(vec![StageTemplate::new(
                "sh",
                &[
                    "-c",
                    "test -s \"$1\" && cp \"$1\" \"$2\"",
                    "prepare",
                    "{input}",
                    "{scratch}/input.dense",
                ],
            )])],
            run: PipelineTemplate::new(vec![StageTemplate::new(
                "sh",
                &["-c", "echo \"Total time: $(cat \"$1\")\"", "run", "{scratch}/input.dense"],
            )]),
        }
    }

    #[tokio::test]
    async fn test_failed_preparation_does_not_reuse_previous_trial() {
        let dir = tempfile::tempdir().unwrap();
        let scratch_root = dir.path().join("scratch");
        let layout = ArtifactLayout::new(dir.path(), "network");
        let runner = TrialRunner::new(
            Arc::new(SystemLauncher::new()),
            layout.clone(),
            tools(),
            10,
            5,
        );
        let entry = AlgorithmEntry::new(Algorithm::Unimod);
        let command = copying_command();

        let first = TrialSpec::new(InstanceKey::new(4), Algorithm::Unimod, 1);
        let second = TrialSpec::new(InstanceKey::new(4), Algorithm::Unimod, 2);
        std::fs::write(layout.artifact_path(&first.instance, 1), "1.5").unwrap();
        std::fs::write(layout.artifact_path(&second.instance, 2), "").unwrap();

        let status = runner.run(first, &entry, &command, &scratch_root).await.unwrap();
        assert_eq!(
            status,
            TrialRunStatus::Executed(RunOutcome::Completed { exit_code: Some(0) })
        );
        let status = runner.run(second, &entry, &command, &scratch_root).await.unwrap();
        assert_eq!(
            status,
            TrialRunStatus::PreparationFailed(RunOutcome::Completed { exit_code: Some(1) })
        );

        let parser = LogParser::new(layout.clone());
        let trial = parser.parse(first).await;
        assert_eq!(trial.time, 1.5);
        assert_eq!(trial.outcome, TrialOutcome::Measured);
        let trial = parser.parse(second).await;
        assert_eq!(trial.time, f64::INFINITY);
        assert_eq!(trial.outcome, TrialOutcome::NoTiming);

        assert!(!partial_path(&layout.stdout_path(&second)).exists());
        assert_eq!(std::fs::read_dir(&scratch_root).unwrap().count(), 0);
    }
}
