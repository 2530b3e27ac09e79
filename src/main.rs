mod doctor;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use baton_core::config::AppConfig;
use baton_core::event::{EventBus, RunEvent};
use baton_core::traits::OutputSink;
use baton_core::types::RunId;
use baton_core::{Bundle, BundleLoader, Status};
use baton_engine::{Dispatcher, Orchestrator, RunLogger};
use baton_tools::{ToolRegistry, Workspace};

#[derive(Parser)]
#[command(name = "baton", version, about = "Run multi-step workflows across command-line AI tools")]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "BATON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundle
    Run {
        /// Bundle name (user bundles shadow built-ins)
        #[arg(required_unless_present = "bundle_file")]
        bundle: Option<String>,
        /// Run input as key=value (repeatable)
        #[arg(short, long = "input", value_parser = parse_input)]
        inputs: Vec<(String, String)>,
        /// Load the bundle from a JSON file instead of by name
        #[arg(long, conflicts_with = "bundle")]
        bundle_file: Option<PathBuf>,
    },
    /// List available bundles
    List,
    /// Print a bundle as JSON
    Show {
        bundle: String,
    },
    /// Check that a bundle loads and validates
    Validate {
        /// Bundle name or path to a JSON file
        bundle: String,
    },
    /// Show current configuration
    Config,
    /// Run system health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("baton=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "baton", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let loader = BundleLoader::from_config(&config);

    match cli.command {
        Commands::Run {
            bundle,
            inputs,
            bundle_file,
        } => {
            let bundle = match (bundle, bundle_file) {
                (_, Some(path)) => loader.load_path(&path)?,
                (Some(name), None) => loader.resolve(&name)?,
                (None, None) => bail!("a bundle name or --bundle-file is required"),
            };
            run_bundle(&config, &bundle, inputs.into_iter().collect()).await?;
        }
        Commands::List => {
            for name in loader.list() {
                println!("{}", name);
            }
        }
        Commands::Show { bundle } => {
            let bundle = loader.resolve(&bundle)?;
            println!("{}", bundle.to_json_pretty()?);
        }
        Commands::Validate { bundle } => {
            let bundle = loader.resolve(&bundle)?;
            println!(
                "{}: ok ({} inputs, {} steps)",
                bundle.name,
                bundle.inputs.len(),
                bundle.step_count()
            );
        }
        Commands::Config => {
            println!("{}", config.to_toml()?);
        }
        Commands::Doctor => {
            println!("Baton Doctor");
            println!("============");
            if !doctor::run_doctor(&config) {
                bail!("doctor found issues");
            }
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Explicit path, then `./baton.toml`, then `~/.baton/config.toml`.
/// Missing files fall back to defaults.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    let local = PathBuf::from("baton.toml");
    if local.exists() {
        return Ok(AppConfig::load(&local)?);
    }

    match dirs_home().map(|h| h.join(".baton").join("config.toml")) {
        Some(path) => {
            if path.exists() {
                info!(path = %path.display(), "Loading config from home directory");
            }
            Ok(AppConfig::load_or_default(&path)?)
        }
        None => Ok(AppConfig::default()),
    }
}

async fn run_bundle(
    config: &AppConfig,
    bundle: &Bundle,
    inputs: HashMap<String, String>,
) -> anyhow::Result<()> {
    let tools = Arc::new(ToolRegistry::from_config(config));
    let event_bus = Arc::new(EventBus::default());
    let orchestrator = Orchestrator::new(
        Dispatcher::new(tools, &config.engine),
        event_bus.clone(),
    );

    let run_id = RunId::new();
    let workspace = Workspace::new(&config.jobs_dir(), &run_id);

    let cancel = tokio_util::sync::CancellationToken::new();
    let log_handle = config.log.enabled.then(|| {
        RunLogger::new(workspace.run_log_path()).spawn(&event_bus, cancel.clone())
    });

    let print_handle = spawn_progress_printer(&event_bus);

    // Ctrl-C stops the logger; in-flight tool processes are killed on drop.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("Interrupted");
        signal_cancel.cancel();
    });

    let report = tokio::select! {
        report = orchestrator.run(run_id, bundle, inputs, &workspace) => report,
        _ = cancel.cancelled() => bail!("run interrupted"),
    };

    print_handle.await.ok();
    if let Some(handle) = log_handle {
        handle.await.ok();
    }

    eprintln!("Job directory: {}", workspace.location());
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    if !report.succeeded() {
        match &report.error {
            Some(err) => bail!("run {} failed: {}", report.run_id, err),
            None => bail!("run {} failed", report.run_id),
        }
    }
    Ok(())
}

/// Print one line per event to stderr until the run ends.
fn spawn_progress_printer(event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            eprintln!("{}", progress_line(&event));
            if matches!(event, RunEvent::RunComplete { .. } | RunEvent::RunFailed { .. }) {
                break;
            }
        }
    })
}

fn progress_line(event: &RunEvent) -> String {
    match event {
        RunEvent::RunStarted {
            run_id,
            bundle,
            steps,
        } => format!("[run {}] {} ({} steps)", run_id, bundle, steps),
        // index is already 1-based
        RunEvent::StepStarted { index, total, name } => format!("[{}/{}] {}", index, total, name),
        RunEvent::StepSkipped { name } => format!("  {}: skipped", name),
        RunEvent::StepFinished {
            name,
            status,
            duration_ms,
        } => {
            let marker = if *status == Status::Failure { "!!" } else { "ok" };
            format!("  [{}] {}: {} ({}ms)", marker, name, status, duration_ms)
        }
        RunEvent::RunComplete {
            steps, duration_ms, ..
        } => format!("Completed {} steps in {}ms", steps, duration_ms),
        RunEvent::RunFailed { step, error, .. } => match step {
            Some(step) => format!("Failed at {}: {}", step, truncate(error, 200)),
            None => format!("Failed: {}", truncate(error, 200)),
        },
    }
}

fn parse_input(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty input name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("codebase=/tmp/x=y").unwrap(),
            ("codebase".to_string(), "/tmp/x=y".to_string())
        );
        assert_eq!(parse_input("k=").unwrap(), ("k".to_string(), String::new()));
        assert!(parse_input("novalue").is_err());
        assert!(parse_input("=v").is_err());
    }

    #[test]
    fn test_truncate_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_progress_counts_from_one() {
        let first = RunEvent::StepStarted {
            index: 1,
            total: 2,
            name: "plan".into(),
        };
        assert_eq!(progress_line(&first), "[1/2] plan");
        let last = RunEvent::StepStarted {
            index: 2,
            total: 2,
            name: "apply".into(),
        };
        assert_eq!(progress_line(&last), "[2/2] apply");
    }

    #[tokio::test]
    async fn test_progress_matches_orchestrator_events() {
        use baton_core::Step;
        use baton_test_utils::{registry_with, MemorySink, MockTool};

        let mock = Arc::new(MockTool::new("echo"));
        let bus = Arc::new(EventBus::default());
        let orch = Orchestrator::new(
            Dispatcher::new(Arc::new(registry_with(&[mock])), &Default::default()),
            bus.clone(),
        );
        let bundle = Bundle::new(
            "two",
            vec![],
            vec![Step::tool("a", "echo", "x"), Step::tool("b", "echo", "y")],
        )
        .unwrap();

        let mut rx = bus.subscribe();
        orch.run(RunId::from_str("r"), &bundle, HashMap::new(), &MemorySink::new())
            .await;

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RunEvent::StepStarted { .. }) {
                started.push(progress_line(&event));
            }
        }
        assert_eq!(started, vec!["[1/2] a", "[2/2] b"]);
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "baton", "run", "review", "-i", "codebase=/src", "--input", "focus=tests",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { bundle, inputs, bundle_file } => {
                assert_eq!(bundle.as_deref(), Some("review"));
                assert_eq!(inputs.len(), 2);
                assert!(bundle_file.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_run_requires_bundle() {
        assert!(Cli::try_parse_from(["baton", "run"]).is_err());
        assert!(Cli::try_parse_from(["baton", "run", "--bundle-file", "b.json"]).is_ok());
    }
}
