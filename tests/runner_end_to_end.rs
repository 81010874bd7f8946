//! Full runs against a fake wallet CLI built from `sh -c`.
//!
//! The configured `cli_command` is `sh -c '<script>' fake-supra`, so the
//! submission arguments land in the script's `$@`.

#![cfg(unix)]

use perpscript::config::{AppConfig, Catalog, ConfigBundle, FailurePolicy};
use perpscript::coordination::StopSignal;
use perpscript::domain::{CycleCount, OutcomeKind};
use perpscript::error::PerpError;
use perpscript::strategy::{
    ExecutorSettings, OrderExecutor, ProcessLauncher, PromptTable, RunLog, RunnerSettings, Secret,
    StopReason, StrategyRunner,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn app(script: &str) -> AppConfig {
    let mut app = AppConfig::default();
    app.cli_command = format!("sh -c '{}' fake-supra", script);
    app.timing.sleep_between_orders_secs = 0;
    app.timing.sleep_between_cycles_secs = 0;
    app.timing.retry_delay_secs = 0;
    app.orders.confirmation_attempts = 2;
    app.orders.exit_grace_ms = 1000;
    app
}

fn runner(app: &AppConfig, run_log: &Path) -> StrategyRunner {
    let bundle = ConfigBundle::new(app.clone(), Catalog::defaults());
    bundle.validate().unwrap();

    let (_, strategy) = bundle.strategy(Some("basic_cycle")).unwrap();
    let (network_name, network) = bundle.select_network(None, strategy).unwrap();

    let prompts = Arc::new(PromptTable::from_config(&app.prompts).unwrap());
    let executor = OrderExecutor::new(
        Arc::new(ProcessLauncher::new(prompts, Duration::from_secs(10))),
        ExecutorSettings::from_config(app, &network_name, &network),
        Secret::new("pw-e2e"),
    );

    StrategyRunner::new(
        bundle.catalog.clone(),
        executor,
        RunLog::new(Some(run_log.to_path_buf()), "basic_cycle", &network_name),
        StopSignal::new(),
        RunnerSettings::from_config(app),
    )
}

#[tokio::test]
async fn test_basic_cycle_against_fake_cli() {
    let dir = tempfile::tempdir().unwrap();
    let argv_log = dir.path().join("argv.txt");
    let run_log = dir.path().join("runs.jsonl");

    let script = format!(
        r#"echo "$@" >> "{}"; printf "Enter your password: "; read pw; echo "Transaction executed successfully""#,
        argv_log.display()
    );
    let app = app(&script);
    let runner = runner(&app, &run_log);
    let strategy = Catalog::defaults().strategies["basic_cycle"].clone();

    let summary = runner
        .run("basic_cycle", &strategy, CycleCount::Finite(2))
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Completed);
    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(summary.stats.confirmed, 4);

    let argv = std::fs::read_to_string(&argv_log).unwrap();
    let lines: Vec<&str> = argv.lines().collect();
    assert_eq!(lines.len(), 4);
    // long then short, twice
    for (line, is_long) in lines.iter().zip([true, false, true, false]) {
        assert!(line.starts_with("move tool run --function-id "), "{}", line);
        assert!(line.contains("u64:300000000 u64:3000000 u64:35000000000000"), "{}", line);
        assert!(line.contains(&format!("bool:{} bool:true bool:true", is_long)), "{}", line);
        assert!(line.ends_with("--rpc-url https://rpc-testnet.supra.com"), "{}", line);
    }

    let records = RunLog::load(&run_log).await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.outcome == OutcomeKind::Confirmed));
    assert_eq!(
        records.iter().map(|r| r.cycle).collect::<Vec<_>>(),
        vec![1, 1, 2, 2]
    );
}

#[tokio::test]
async fn test_rejection_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let run_log = dir.path().join("runs.jsonl");

    let mut app = app(r#"printf "Password: "; read pw; echo "Error: EINSUFFICIENT_BALANCE""#);
    app.run.on_failure = FailurePolicy::Abort;
    let runner = runner(&app, &run_log);
    let strategy = Catalog::defaults().strategies["basic_cycle"].clone();

    let err = runner
        .run("basic_cycle", &strategy, CycleCount::Finite(1))
        .await
        .unwrap_err();

    match err {
        PerpError::ExecutionFailed { attempts, outcome, .. } => {
            assert_eq!(attempts, 1);
            assert!(outcome.contains("EINSUFFICIENT_BALANCE"));
        }
        other => panic!("unexpected error: {}", other),
    }

    let records = RunLog::load(&run_log).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, OutcomeKind::Rejected);
    assert_eq!(records[0].attempts, 1);
}

#[tokio::test]
async fn test_silent_cli_is_retried_then_counted() {
    let dir = tempfile::tempdir().unwrap();
    let run_log = dir.path().join("runs.jsonl");

    let mut app = app("exec sleep 30");
    app.run.max_consecutive_failures = 0;
    let bundle = ConfigBundle::new(app.clone(), Catalog::defaults());
    let (_, strategy) = bundle.strategy(Some("basic_cycle")).unwrap();
    let (network_name, network) = bundle.select_network(None, strategy).unwrap();

    let prompts = Arc::new(PromptTable::from_config(&app.prompts).unwrap());
    let executor = OrderExecutor::new(
        Arc::new(ProcessLauncher::new(prompts, Duration::from_millis(200))),
        ExecutorSettings::from_config(&app, &network_name, &network),
        Secret::new("pw-e2e"),
    );
    let runner = StrategyRunner::new(
        bundle.catalog.clone(),
        executor,
        RunLog::new(Some(run_log.clone()), "basic_cycle", &network_name),
        StopSignal::new(),
        RunnerSettings::from_config(&app),
    );

    let summary = runner
        .run("basic_cycle", strategy, CycleCount::Finite(1))
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Completed);
    assert_eq!(summary.stats.timed_out, 2);

    let records = RunLog::load(&run_log).await.unwrap();
    assert!(records
        .iter()
        .all(|r| r.outcome == OutcomeKind::TimedOut && r.attempts == 2));
}
