use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use baton_core::traits::ToolAdapter;
use baton_core::AppConfig;

use crate::command::CommandTool;
use crate::{manifest, presets};

/// Registry of available tools, keyed by identifier.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: impl ToolAdapter) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolAdapter>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced registered tool");
        }
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Create a registry with the built-in presets registered.
    pub fn with_presets() -> Self {
        let mut registry = Self::new();
        for name in presets::PRESET_NAMES {
            if let Some(tool) = CommandTool::from_preset(name) {
                registry.register(tool);
            }
        }
        registry
    }

    /// Presets, then `[tools.*]` from config, then drop-in manifests.
    /// Later sources override earlier ones.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::with_presets();
        for (name, tool) in &config.tools {
            registry.register(CommandTool::new(name.clone(), tool.clone()));
        }
        manifest::load_and_register_tools(&config.tools_dir(), &mut registry);
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
