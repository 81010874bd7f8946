//! Sessions against real child processes.
//!
//! Each fake CLI is a short `sh -c` script that prints prompts and reads
//! answers from its terminal the way the wallet CLI does.

#![cfg(unix)]

use nix::sys::signal::kill;
use nix::unistd::Pid;
use perpscript::config::{OrdersConfig, PromptConfig};
use perpscript::domain::{ExecutionResult, PromptKind, SessionState};
use perpscript::error::SessionError;
use perpscript::strategy::{
    ProcessLauncher, ProcessSession, PromptTable, Secret, SessionLauncher, SessionReport,
    SessionScript, SubmissionCommand,
};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "correct-horse";

fn orders() -> OrdersConfig {
    OrdersConfig {
        max_confirmations: 2,
        exit_grace_ms: 1000,
        ..OrdersConfig::default()
    }
}

fn script(program: &str, args: &[&str]) -> SessionScript {
    let command = SubmissionCommand {
        program: program.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    };
    SessionScript::new("fake order", command, Secret::new(SECRET), &orders())
}

fn shell(body: &str) -> SessionScript {
    script("sh", &["-c", body])
}

async fn run(script: SessionScript, wait_bound: Duration) -> SessionReport {
    let prompts = PromptTable::from_config(&PromptConfig::default()).unwrap();
    ProcessSession::new(script).run(&prompts, wait_bound).await
}

fn assert_reaped(pid: Option<u32>) {
    let pid = pid.expect("child had a pid");
    assert!(
        kill(Pid::from_raw(pid as i32), None).is_err(),
        "process {} is still around",
        pid
    );
}

#[tokio::test]
async fn test_silent_cli_times_out_and_is_reaped() {
    let report = run(script("sleep", &["30"]), Duration::from_millis(300)).await;

    assert_eq!(
        report.outcome,
        ExecutionResult::TimedOut {
            waited: Duration::from_millis(300),
            submitted: false,
        }
    );
    assert_eq!(report.state, SessionState::TimedOut);
    assert!(report.outcome.is_retryable());
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_silence_after_confirmation_is_not_retryable() {
    let body = r#"printf 'Password: '; read pw; printf 'Submit transaction? (y/n) '; read answer; exec sleep 30"#;
    let report = run(shell(body), Duration::from_millis(500)).await;

    assert_eq!(
        report.outcome,
        ExecutionResult::TimedOut {
            waited: Duration::from_millis(500),
            submitted: true,
        }
    );
    assert!(!report.outcome.is_retryable());
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_password_read_from_controlling_terminal() {
    let body = r#"printf 'Enter your password: ' > /dev/tty; read pw < /dev/tty; if [ "$pw" = "correct-horse" ]; then echo 'Transaction executed successfully'; else echo "Error: got [$pw]"; fi"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert_eq!(
        report.outcome,
        ExecutionResult::Confirmed {
            detail: "Transaction executed successfully".to_string()
        }
    );
    assert!(!report.transcript.contains(SECRET));
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_helpers_started_by_the_cli_are_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("helper.pid");
    let body = format!(
        r#"sleep 30 & echo $! > "{}"; wait"#,
        pid_file.display()
    );
    let report = run(shell(&body), Duration::from_millis(500)).await;

    assert!(matches!(report.outcome, ExecutionResult::TimedOut { .. }));
    assert_reaped(report.pid);

    let helper: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    // the helper is not our child; it may linger as a zombie until reaped
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(is_dead(helper), "helper {} survived", helper);
}

fn is_dead(pid: i32) -> bool {
    if kill(Pid::from_raw(pid), None).is_err() {
        return true;
    }
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .map(|stat| {
            stat.rsplit_once(')')
                .map_or(false, |(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[tokio::test]
async fn test_password_then_success() {
    let body = r#"printf 'Enter your password: '; read pw; if [ "$pw" = "correct-horse" ]; then echo 'Transaction executed successfully'; else echo 'Error: bad passphrase'; fi"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert_eq!(
        report.outcome,
        ExecutionResult::Confirmed {
            detail: "Transaction executed successfully".to_string()
        }
    );
    assert_eq!(report.state, SessionState::Completed);
    assert!(!report.transcript.contains(SECRET));
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_confirmation_answered_with_configured_response() {
    let body = r#"printf 'Password: '; read pw; printf 'Submit transaction? (y/n) '; read answer; if [ "$answer" = "yes" ]; then echo '{"status": "Success"}'; else echo 'aborted by user'; fi"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert!(report.outcome.is_confirmed(), "{:?}", report.outcome);
    assert!(report
        .transitions
        .iter()
        .any(|t| t.to == SessionState::Matched(PromptKind::Confirmation)));
}

#[tokio::test]
async fn test_error_marker_is_rejection() {
    let body = r#"printf 'Password: '; read pw; echo 'Simulating transaction'; echo 'Error: EINSUFFICIENT_BALANCE (code 65542)'"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert_eq!(
        report.outcome,
        ExecutionResult::Rejected {
            reason: "Error: EINSUFFICIENT_BALANCE (code 65542)".to_string()
        }
    );
    assert_eq!(report.state, SessionState::Failed);
}

#[tokio::test]
async fn test_error_on_stderr_is_seen() {
    let body = r#"printf 'Password: '; read pw; echo 'Error: profile not found' >&2"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert!(
        matches!(report.outcome, ExecutionResult::Rejected { ref reason } if reason.contains("profile not found")),
        "{:?}",
        report.outcome
    );
}

#[tokio::test]
async fn test_exit_without_marker_is_prompt_mismatch() {
    let report = run(shell("echo 'Building transaction'"), Duration::from_secs(10)).await;

    assert!(matches!(
        report.outcome,
        ExecutionResult::ProcessError(SessionError::PromptMismatch(_))
    ));
    assert!(!report.outcome.is_retryable());
}

#[tokio::test]
async fn test_repeated_password_prompt_fails() {
    let body = r#"printf 'Password: '; read a; printf 'Password: '; read b; echo 'Transaction executed successfully'"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert!(
        matches!(
            report.outcome,
            ExecutionResult::ProcessError(SessionError::PromptMismatch(ref msg)) if msg.contains("password")
        ),
        "{:?}",
        report.outcome
    );
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_confirmation_limit() {
    let body = r#"while true; do printf 'Continue? (y/n) '; read answer || exit 0; done"#;
    let report = run(shell(body), Duration::from_secs(10)).await;

    assert!(
        matches!(
            report.outcome,
            ExecutionResult::ProcessError(SessionError::PromptMismatch(ref msg)) if msg.contains("confirmation")
        ),
        "{:?}",
        report.outcome
    );
    assert_reaped(report.pid);
}

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let report = run(
        script("/nonexistent/perpscript-fake-cli", &[]),
        Duration::from_secs(1),
    )
    .await;

    assert!(matches!(
        report.outcome,
        ExecutionResult::ProcessError(SessionError::Spawn { .. })
    ));
    assert!(report.outcome.is_retryable());
    assert!(report.pid.is_none());
}

#[tokio::test]
async fn test_launcher_runs_fresh_session_each_time() {
    let prompts = Arc::new(PromptTable::from_config(&PromptConfig::default()).unwrap());
    let launcher = ProcessLauncher::new(prompts, Duration::from_secs(10));
    let script = shell("printf 'Password: '; read pw; echo 'Transaction executed successfully'");

    for _ in 0..2 {
        assert!(launcher.launch(&script).await.is_confirmed());
    }
}
