use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use baton_core::error::{BatonError, Result};
use baton_core::traits::ToolAdapter;
use baton_core::types::{ToolOutput, ToolRequest};
use baton_core::ToolConfig;

use crate::presets;

/// A tool backed by an external command-line program.
///
/// Each argument may contain `{task}` and `{model}` placeholders. The
/// program is spawned directly, without a shell, so the task text reaches
/// it as a single argument however it is quoted.
pub struct CommandTool {
    name: String,
    config: ToolConfig,
}

impl CommandTool {
    pub fn new(name: impl Into<String>, config: ToolConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Build a tool from a built-in preset.
    pub fn from_preset(name: &str) -> Option<Self> {
        presets::get_preset(name).map(|preset| Self::new(name, preset.to_config()))
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Substitute placeholders in every configured argument.
    pub fn build_args(&self, task: &str, model: &str) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                // Split on {task} first so the task text is never rescanned.
                arg.split("{task}")
                    .map(|part| part.replace("{model}", model))
                    .collect::<Vec<_>>()
                    .join(task)
            })
            .collect()
    }
}

impl ToolAdapter for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<ToolOutput>> {
        let args = self.build_args(&request.task, &request.model);

        Box::pin(async move {
            debug!(
                tool = %self.name,
                command = %self.config.command,
                working_dir = %request.working_dir.display(),
                "Spawning tool"
            );

            let mut cmd = tokio::process::Command::new(&self.config.command);
            cmd.args(&args)
                .current_dir(&request.working_dir)
                .envs(&self.config.env)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let output = if self.config.timeout_secs > 0 {
                let timeout = Duration::from_secs(self.config.timeout_secs);
                match tokio::time::timeout(timeout, cmd.output()).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(BatonError::ToolTimeout {
                            tool: self.name.clone(),
                            timeout_secs: self.config.timeout_secs,
                        })
                    }
                }
            } else {
                cmd.output().await
            };

            let output = output.map_err(|e| BatonError::ExecFailed {
                tool: self.name.clone(),
                message: format!("cannot run {}: {}", self.config.command, e),
            })?;

            Ok(ToolOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                success: output.status.success(),
                exit_code: output.status.code(),
            })
        })
    }
}
