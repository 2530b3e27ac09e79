use std::collections::BTreeMap;

use baton_core::config::AppConfig;
use baton_core::traits::ToolAdapter;
use baton_core::BundleLoader;
use baton_tools::{manifest, presets};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Print every check and return whether all of them passed.
pub fn run_doctor(config: &AppConfig) -> bool {
    let mut checks = Vec::new();

    // 1. Workspace dir exists and writable
    checks.push(check_workspace(config));

    // 2. Bundles load and validate
    checks.push(check_bundles(config));

    // 3. Every tool command resolvable on PATH
    checks.extend(check_tools(config));

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count == 0
}

fn check_workspace(config: &AppConfig) -> CheckResult {
    let ws = config.workspace_dir();
    if let Err(e) = std::fs::create_dir_all(config.jobs_dir()) {
        return CheckResult {
            label: "Workspace".into(),
            ok: false,
            detail: format!("{} (cannot create: {})", ws.display(), e),
        };
    }

    let test_file = config.jobs_dir().join(".doctor_test");
    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            std::fs::remove_file(&test_file).ok();
            CheckResult {
                label: "Workspace".into(),
                ok: true,
                detail: format!("{}", ws.display()),
            }
        }
        Err(e) => CheckResult {
            label: "Workspace".into(),
            ok: false,
            detail: format!("{} (not writable: {})", ws.display(), e),
        },
    }
}

fn check_bundles(config: &AppConfig) -> CheckResult {
    let loader = BundleLoader::from_config(config);
    let names = loader.list();
    let broken: Vec<String> = names
        .iter()
        .filter_map(|name| loader.load(name).err().map(|e| format!("{}: {}", name, e)))
        .collect();

    if broken.is_empty() {
        CheckResult {
            label: "Bundles".into(),
            ok: true,
            detail: format!("{} available", names.len()),
        }
    } else {
        CheckResult {
            label: "Bundles".into(),
            ok: false,
            detail: broken.join("; "),
        }
    }
}

/// Tool name to command, layered the same way the registry is.
fn tool_commands(config: &AppConfig) -> BTreeMap<String, String> {
    let mut commands = BTreeMap::new();
    for name in presets::PRESET_NAMES {
        if let Some(preset) = presets::get_preset(name) {
            commands.insert(name.to_string(), preset.command.to_string());
        }
    }
    for (name, tool) in &config.tools {
        commands.insert(name.clone(), tool.command.clone());
    }
    for tool in manifest::load_tools(&config.tools_dir()) {
        commands.insert(tool.name().to_string(), tool.config().command.clone());
    }
    commands
}

fn check_tools(config: &AppConfig) -> Vec<CheckResult> {
    tool_commands(config)
        .into_iter()
        .map(|(name, command)| match manifest::which(&command) {
            Some(path) => CheckResult {
                label: format!("Tool {}", name),
                ok: true,
                detail: format!("{}", path.display()),
            },
            None => CheckResult {
                label: format!("Tool {}", name),
                ok: false,
                detail: format!("'{}' not found on PATH", command),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::config::ToolConfig;

    #[test]
    fn test_config_tools_override_presets() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace.root = tmp.path().display().to_string();
        config.tools.insert(
            "claude".into(),
            ToolConfig {
                command: "/opt/claude-wrapper".into(),
                args: vec![],
                default_model: String::new(),
                timeout_secs: 0,
                env: Default::default(),
            },
        );

        let commands = tool_commands(&config);
        assert_eq!(commands["claude"], "/opt/claude-wrapper");
        assert!(commands.contains_key("codex"));
        assert!(commands.contains_key("gemini"));
    }

    #[test]
    fn test_workspace_check_creates_jobs_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace.root = tmp.path().join("ws").display().to_string();

        let check = check_workspace(&config);
        assert!(check.ok, "{}", check.detail);
        assert!(config.jobs_dir().is_dir());
    }
}
