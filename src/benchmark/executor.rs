//! Process pipeline execution with a wall-clock limit

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::fs;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration};

use crate::error::{BenchError, BenchResult};
use crate::models::command::{self, PipelineTemplate, TemplateVars};

/// One resolved program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub program: String,
    pub args: Vec<String>,
}

/// A resolved pipeline, ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl Pipeline {
    /// Substitute placeholders in every program, argument and redirection
    pub fn render(template: &PipelineTemplate, vars: &TemplateVars) -> Self {
        Self {
            stages: template
                .stages
                .iter()
                .map(|stage| Stage {
                    program: command::render(&stage.program, vars),
                    args: stage.args.iter().map(|a| command::render(a, vars)).collect(),
                })
                .collect(),
            stdout: template
                .stdout
                .as_deref()
                .map(|p| PathBuf::from(command::render(p, vars))),
            stderr: template
                .stderr
                .as_deref()
                .map(|p| PathBuf::from(command::render(p, vars))),
        }
    }

    /// Replace both redirections of the last stage
    pub fn redirect(mut self, stdout: PathBuf, stderr: PathBuf) -> Self {
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(&stage.program)?;
            for arg in &stage.args {
                write!(f, " {}", arg)?;
            }
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", path.display())?;
        }
        if let Some(path) = &self.stderr {
            write!(f, " 2> {}", path.display())?;
        }
        Ok(())
    }
}

/// How a launched pipeline ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All stages exited; the code is the last stage's, `None` if it was signalled
    Completed { exit_code: Option<i32> },
    /// The wall-clock limit expired and every stage was killed
    Killed,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { exit_code: Some(0) })
    }
}

/// Launches external pipelines
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run a pipeline to completion or until `limit` expires.
    ///
    /// Failing to start any stage is an error; the stage's exit status is not.
    async fn run_pipeline(&self, pipeline: &Pipeline, limit: Duration) -> BenchResult<RunOutcome>;
}

/// Launcher backed by real operating system processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn run_pipeline(&self, pipeline: &Pipeline, limit: Duration) -> BenchResult<RunOutcome> {
        if pipeline.stages.is_empty() {
            return Err(BenchError::Process("pipeline has no stages".to_string()));
        }

        tracing::debug!(pipeline = %pipeline, limit_secs = limit.as_secs(), "Launching pipeline");

        let mut children: Vec<Child> = Vec::with_capacity(pipeline.stages.len());
        let mut upstream: Option<Stdio> = None;
        let last = pipeline.stages.len() - 1;

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let mut cmd = Command::new(&stage.program);
            cmd.args(&stage.args)
                .stdin(upstream.take().unwrap_or_else(Stdio::null))
                .kill_on_drop(true);

            if i == last {
                cmd.stdout(redirect_to(pipeline.stdout.as_deref(), Stdio::null).await?);
                cmd.stderr(redirect_to(pipeline.stderr.as_deref(), Stdio::inherit).await?);
            } else {
                cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
            }

            // Children spawned so far are killed on drop if this fails
            let mut child = cmd.spawn().map_err(|source| BenchError::Launch {
                program: stage.program.clone(),
                source,
            })?;

            if i != last {
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| BenchError::Process(format!("no stdout for '{}'", stage.program)))?;
                upstream = Some(stdout.try_into().map_err(|e: std::io::Error| {
                    BenchError::Process(format!("cannot pipe '{}': {}", stage.program, e))
                })?);
            }

            children.push(child);
        }

        let waited = timeout(limit, wait_all(&mut children)).await;
        match waited {
            Ok(status) => Ok(RunOutcome::Completed {
                exit_code: status?.code(),
            }),
            Err(_) => {
                tracing::warn!(pipeline = %pipeline, "Wall-clock limit expired, killing pipeline");
                for child in &mut children {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!("Kill failed: {}", e);
                    }
                }
                for child in &mut children {
                    let _ = child.wait().await;
                }
                Ok(RunOutcome::Killed)
            }
        }
    }
}

/// Wait for every stage in order and return the last stage's status
async fn wait_all(children: &mut [Child]) -> BenchResult<ExitStatus> {
    let mut last = None;
    for child in children.iter_mut() {
        let status = child
            .wait()
            .await
            .map_err(|e| BenchError::Process(format!("waiting on child failed: {}", e)))?;
        last = Some(status);
    }
    last.ok_or_else(|| BenchError::Process("pipeline has no stages".to_string()))
}

async fn redirect_to(path: Option<&Path>, fallback: fn() -> Stdio) -> BenchResult<Stdio> {
    match path {
        Some(path) => {
            let file = fs::File::create(path)
                .await
                .map_err(|e| BenchError::io(path, e))?;
            Ok(Stdio::from(file.into_std().await))
        }
        None => Ok(fallback()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageTemplate;

    fn stage(program: &str, args: &[&str]) -> Stage {
        Stage {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn pipeline(stages: Vec<Stage>) -> Pipeline {
        Pipeline {
            stages,
            stdout: None,
            stderr: None,
        }
    }

    #[test]
    fn test_render_pipeline() {
        let template = PipelineTemplate::new(vec![
            StageTemplate::new("gunzip", &["-cd", "{input}"]),
            StageTemplate::new("{build_dir}/cmr-tu", &["-", "--time-limit", "{time_limit}"]),
        ])
        .with_stdout("{scratch}/out");

        let mut vars = TemplateVars::new();
        vars.insert("input", "a.sparse.gz".to_string());
        vars.insert("build_dir", "/opt/cmr".to_string());
        vars.insert("time_limit", "3600".to_string());
        vars.insert("scratch", "/tmp/s".to_string());

        let pipeline = Pipeline::render(&template, &vars);
        assert_eq!(pipeline.stages[0], stage("gunzip", &["-cd", "a.sparse.gz"]));
        assert_eq!(pipeline.stages[1].program, "/opt/cmr/cmr-tu");
        assert_eq!(pipeline.stdout, Some(PathBuf::from("/tmp/s/out")));
        assert_eq!(
            pipeline.to_string(),
            "gunzip -cd a.sparse.gz | /opt/cmr/cmr-tu - --time-limit 3600 > /tmp/s/out"
        );
    }

    #[tokio::test]
    async fn test_pipeline_output_is_redirected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");

        let pipeline = pipeline(vec![
            stage("printf", &["alpha\\nbeta\\n"]),
            stage("sh", &["-c", "grep beta; echo oops >&2"]),
        ])
        .redirect(out.clone(), err.clone());

        let outcome = SystemLauncher::new()
            .run_pipeline(&pipeline, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "beta\n");
        assert_eq!(std::fs::read_to_string(&err).unwrap(), "oops\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let outcome = SystemLauncher::new()
            .run_pipeline(&pipeline(vec![stage("sh", &["-c", "exit 3"])]), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed { exit_code: Some(3) });
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_limit_kills_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let pipeline = pipeline(vec![stage("sleep", &["30"])]).redirect(out.clone(), dir.path().join("err"));

        let outcome = SystemLauncher::new()
            .run_pipeline(&pipeline, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Killed);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let result = SystemLauncher::new()
            .run_pipeline(
                &pipeline(vec![stage("/definitely/not/a/program", &[])]),
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(result, Err(BenchError::Launch { .. })));
    }
}
