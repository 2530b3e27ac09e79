use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BatonError, Result};

/// Top-level Baton configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// External tools keyed by identifier. Overrides built-in presets.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory for jobs, user bundles, and tool manifests.
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run input whose value becomes the tools' working directory.
    #[serde(default = "default_workdir_input")]
    pub workdir_input: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workdir_input: default_workdir_input(),
        }
    }
}

/// Runtime logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Write a JSONL event log into each job directory.
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
        }
    }
}

/// An external command-line tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable to spawn.
    pub command: String,
    /// Arguments; `{task}` and `{model}` are substituted per argument.
    #[serde(default)]
    pub args: Vec<String>,
    /// Model used when a step does not override it.
    #[serde(default)]
    pub default_model: String,
    /// Per-invocation timeout. 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Extra environment variables for the process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_root() -> String { "~/.baton".to_string() }
fn default_workdir_input() -> String { "codebase".to_string() }
fn default_log_enabled() -> bool { true }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| BatonError::ConfigNotFound(path.display().to_string()))?;

        Self::from_toml(&content)
    }

    /// Load config from a file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string, with env var expansion.
    pub fn from_toml(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| BatonError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BatonError::Config(e.to_string()))
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        let ws = &self.workspace.root;
        if let Some(rest) = ws.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(ws)
    }

    /// User bundle directory.
    pub fn bundles_dir(&self) -> PathBuf {
        self.workspace_dir().join("bundles")
    }

    /// Drop-in tool manifest directory.
    pub fn tools_dir(&self) -> PathBuf {
        self.workspace_dir().join("tools")
    }

    /// Parent directory of per-run job directories.
    pub fn jobs_dir(&self) -> PathBuf {
        self.workspace_dir().join("jobs")
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
