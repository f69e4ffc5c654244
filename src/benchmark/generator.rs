//! Instance generation

use std::sync::Arc;

use tokio::fs;
use tokio::time::Duration;

use super::executor::{Pipeline, ProcessLauncher, RunOutcome};
use super::layout::{partial_path, ArtifactLayout};
use super::runner::instance_vars;
use crate::config::ToolConfig;
use crate::error::{BenchError, BenchResult};
use crate::models::{InstanceKey, PipelineTemplate};

/// What happened to one (instance, sample) artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateStatus {
    Generated,
    AlreadyPresent,
    /// The generator did not succeed; no artifact was written
    Failed(RunOutcome),
}

/// Writes compressed matrices using the sweep's generator pipeline
pub struct InstanceGenerator {
    launcher: Arc<dyn ProcessLauncher>,
    layout: ArtifactLayout,
    tools: ToolConfig,
    template: PipelineTemplate,
    time_limit: Duration,
}

impl InstanceGenerator {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        layout: ArtifactLayout,
        tools: ToolConfig,
        template: PipelineTemplate,
        time_limit: Duration,
    ) -> Self {
        Self {
            launcher,
            layout,
            tools,
            template,
            time_limit,
        }
    }

    /// Generate one artifact unless it already exists
    pub async fn generate(&self, instance: &InstanceKey, sample: u32) -> BenchResult<GenerateStatus> {
        let artifact = self.layout.artifact_path(instance, sample);
        if artifact.exists() {
            tracing::debug!(instance = %instance, sample, "Artifact already present");
            return Ok(GenerateStatus::AlreadyPresent);
        }

        let partial = partial_path(&artifact);
        let mut pipeline = Pipeline::render(&self.template, &instance_vars(&self.tools, instance, sample));
        pipeline.stdout = Some(partial.clone());

        tracing::info!(instance = %instance, sample, "Generating instance");
        let outcome = self.launcher.run_pipeline(&pipeline, self.time_limit).await?;

        if !outcome.is_success() {
            tracing::warn!(instance = %instance, sample, outcome = ?outcome, "Generator failed");
            if let Err(e) = fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), "Partial artifact not removed: {}", e);
            }
            return Ok(GenerateStatus::Failed(outcome));
        }

        fs::rename(&partial, &artifact)
            .await
            .map_err(|e| BenchError::io(&partial, e))?;
        Ok(GenerateStatus::Generated)
    }
}
