use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use baton_core::config::EngineConfig;
use baton_core::event::EventBus;
use baton_core::types::RunId;
use baton_core::{BundleLoader, ErrorCode, Status};
use baton_engine::{Dispatcher, Orchestrator, RunLogger, RunState};
use baton_test_utils::{inputs, registry_with, review_bundle, MockTool};
use baton_tools::Workspace;

fn orchestrator(tools: &[Arc<MockTool>]) -> Orchestrator {
    let dispatcher = Dispatcher::new(Arc::new(registry_with(tools)), &EngineConfig::default());
    Orchestrator::new(dispatcher, Arc::new(EventBus::default()))
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_review_bundle_writes_job_directory() {
    let jobs = tempfile::tempdir().unwrap();
    let alpha = Arc::new(MockTool::new("alpha").with_outputs(&["missing docs\nunchecked unwrap"]));
    let beta = Arc::new(MockTool::new("beta").with_output("unchecked unwrap\nslow loop"));
    let orch = orchestrator(&[alpha.clone(), beta.clone()]);

    let run_id = RunId::from_str("it-review");
    let workspace = Workspace::new(jobs.path(), &run_id);
    let logger = RunLogger::new(workspace.run_log_path())
        .spawn(orch.event_bus(), CancellationToken::new());

    let report = orch
        .run(
            run_id,
            &review_bundle(),
            inputs(&[("codebase", jobs.path().to_str().unwrap())]),
            &workspace,
        )
        .await;
    logger.await.unwrap();

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.state, RunState::Completed);

    // Tools ran in the codebase directory.
    assert_eq!(beta.calls()[0].working_dir, jobs.path());

    let job = jobs.path().join("it-review");
    for step in ["review_a", "review_b", "findings", "summary"] {
        assert!(
            job.join("outputs").join(format!("{}.json", step)).is_file(),
            "missing output for {}",
            step
        );
    }

    let findings = read_json(&job.join("outputs").join("findings.json"));
    assert_eq!(
        findings["output"],
        serde_json::json!(["missing docs", "unchecked unwrap", "slow loop"])
    );
    assert_eq!(
        std::fs::read_to_string(job.join("findings.txt")).unwrap(),
        "missing docs\nunchecked unwrap\nslow loop"
    );

    // The summary task saw the merged findings through templating.
    let summary_task = &alpha.calls()[1].task;
    assert!(summary_task.starts_with("Summarize "));
    assert!(summary_task.contains("slow loop"));

    let log = std::fs::read_to_string(job.join("run.jsonl")).unwrap();
    let events: Vec<String> = log
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["event"]
            .as_str()
            .unwrap()
            .to_string())
        .collect();
    assert_eq!(events.first().map(String::as_str), Some("run_started"));
    assert_eq!(events.last().map(String::as_str), Some("run_complete"));
    assert_eq!(events.iter().filter(|e| *e == "step_finished").count(), 3);
}

#[tokio::test]
async fn test_failing_reviewer_skips_summary_and_keeps_partial() {
    let jobs = tempfile::tempdir().unwrap();
    let alpha = Arc::new(MockTool::new("alpha").with_output("one finding"));
    let beta = Arc::new(MockTool::new("beta").failing(2, "quota exceeded"));
    let orch = orchestrator(&[alpha.clone(), beta]);

    let workspace = Workspace::at(jobs.path().join("job"));
    let report = orch
        .run(
            RunId::from_str("partial"),
            &review_bundle(),
            inputs(&[("codebase", ".")]),
            &workspace,
        )
        .await;

    assert!(report.succeeded());
    let reviews = report.context.get_result("reviews").unwrap();
    assert_eq!(reviews.status(), Status::Partial);
    let failed = report.context.get_result("review_b").unwrap();
    assert_eq!(failed.error().unwrap().code, ErrorCode::ExecFailed);
    assert_eq!(
        report.context.get_result("summary").unwrap().status(),
        Status::Skipped
    );
    assert_eq!(alpha.call_count(), 1);
    assert!(jobs.path().join("job").join("findings.txt").is_file());
}

#[tokio::test]
async fn test_missing_required_input_fails_before_any_step() {
    let jobs = tempfile::tempdir().unwrap();
    let alpha = Arc::new(MockTool::new("alpha"));
    let orch = orchestrator(&[alpha.clone(), Arc::new(MockTool::new("beta"))]);

    let report = orch
        .run(
            RunId::from_str("no-input"),
            &review_bundle(),
            HashMap::new(),
            &Workspace::at(jobs.path().join("job")),
        )
        .await;

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(
        report.summary.error().unwrap().code,
        ErrorCode::MissingInput
    );
    assert_eq!(alpha.call_count(), 0);
}

#[test]
fn test_builtin_bundles_load() {
    let empty = tempfile::tempdir().unwrap();
    let loader = BundleLoader::new(empty.path());
    let names = loader.list();
    assert!(names.contains(&"review".to_string()));
    assert!(names.contains(&"consensus".to_string()));
    for name in names {
        loader.load(&name).unwrap();
    }
}
