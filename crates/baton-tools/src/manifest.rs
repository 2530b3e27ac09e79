use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use baton_core::traits::ToolAdapter;
use baton_core::ToolConfig;

use crate::command::CommandTool;
use crate::registry::ToolRegistry;

/// Environment prerequisites for a drop-in tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prerequisites {
    /// Binaries that must be on PATH.
    #[serde(default)]
    pub required_binaries: Vec<String>,
    /// Environment variables that must be set.
    #[serde(default)]
    pub required_env: Vec<String>,
}

/// TOML manifest for a drop-in tool.
///
/// Lives at `<workspace>/tools/<name>/tool.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    /// Identifier referenced by bundle steps.
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub prerequisites: Prerequisites,
}

impl ToolManifest {
    pub fn into_tool(self) -> CommandTool {
        CommandTool::new(
            self.name,
            ToolConfig {
                command: self.command,
                args: self.args,
                default_model: self.default_model,
                timeout_secs: self.timeout_secs,
                env: self.env,
            },
        )
    }
}

/// Load drop-in tools from a directory and register them.
///
/// Returns the number of tools registered.
pub fn load_and_register_tools(dir: &Path, registry: &mut ToolRegistry) -> usize {
    let tools = load_tools(dir);
    let count = tools.len();
    for tool in tools {
        info!(tool = %tool.name(), "Registered drop-in tool");
        registry.register(tool);
    }
    count
}

/// Scan `dir` for subdirectories holding a `tool.toml`.
pub fn load_tools(dir: &Path) -> Vec<CommandTool> {
    let mut tools = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Cannot read tools directory");
            return tools;
        }
    };

    for entry in entries.flatten() {
        let tool_dir = entry.path();
        if !tool_dir.is_dir() {
            continue;
        }

        let manifest_path = tool_dir.join("tool.toml");
        if !manifest_path.exists() {
            debug!(path = %tool_dir.display(), "No tool.toml, skipping");
            continue;
        }

        let content = match std::fs::read_to_string(&manifest_path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Failed to read tool manifest");
                continue;
            }
        };

        let manifest: ToolManifest = match toml::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Failed to parse tool manifest");
                continue;
            }
        };

        if let Err(reason) = check_prerequisites(&manifest.prerequisites) {
            warn!(
                tool = %manifest.name,
                reason = %reason,
                "Skipping tool: prerequisites not met"
            );
            continue;
        }

        tools.push(manifest.into_tool());
    }

    tools
}

/// Ok when every prerequisite holds, otherwise a description of the first miss.
pub fn check_prerequisites(prereqs: &Prerequisites) -> std::result::Result<(), String> {
    for bin in &prereqs.required_binaries {
        if which(bin).is_none() {
            return Err(format!("required binary '{}' not found on PATH", bin));
        }
    }

    for var in &prereqs.required_env {
        if std::env::var(var).is_err() {
            return Err(format!("required env var '{}' is not set", var));
        }
    }

    Ok(())
}

/// Search PATH for an executable file.
pub fn which(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
