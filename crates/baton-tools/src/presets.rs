use std::collections::BTreeMap;

use baton_core::ToolConfig;

/// Built-in invocation settings for a well-known coding CLI.
pub struct ToolPreset {
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub default_model: &'static str,
}

impl ToolPreset {
    pub fn to_config(&self) -> ToolConfig {
        ToolConfig {
            command: self.command.to_string(),
            args: self.args.iter().map(|a| a.to_string()).collect(),
            default_model: self.default_model.to_string(),
            timeout_secs: 0,
            env: BTreeMap::new(),
        }
    }
}

/// Names with a built-in preset.
pub const PRESET_NAMES: &[&str] = &["claude", "codex", "gemini"];

/// Look up a tool preset by name.
pub fn get_preset(name: &str) -> Option<ToolPreset> {
    match name {
        "claude" => Some(ToolPreset {
            command: "claude",
            args: &["-p", "{task}", "--model", "{model}"],
            default_model: "sonnet",
        }),
        "codex" => Some(ToolPreset {
            command: "codex",
            args: &["exec", "--model", "{model}", "{task}"],
            default_model: "gpt-5-codex",
        }),
        "gemini" => Some(ToolPreset {
            command: "gemini",
            args: &["--model", "{model}", "-p", "{task}"],
            default_model: "gemini-2.5-pro",
        }),
        _ => None,
    }
}
