//! Scripted dialogue with one wallet CLI process.
//!
//! A session spawns the CLI on a pseudo-terminal, reads its merged output as
//! one transcript, and reacts to the earliest recognized pattern until a
//! success or error marker appears. The child is released on every path.

use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::command::SubmissionCommand;
use super::terminal::{spawn_attached, Attached, InputStream};
use crate::config::{OrdersConfig, PromptConfig};
use crate::domain::{ExecutionResult, PromptKind, SessionState, StateTransition};
use crate::error::{PerpError, Result, SessionError};

/// Time a terminated child gets before it is killed outright
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

const REDACTED: &str = "***";

/// CLI profile password. Zeroized on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the secret from an environment variable. A profile without a
    /// password is allowed, but an empty value is usually a mistake.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) => {
                if value.is_empty() {
                    warn!("{} is set but empty; answering password prompts with an empty line", var);
                }
                Ok(Self(value))
            }
            Err(_) => Err(PerpError::MissingSecret(var.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the secret in `text`
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.0, REDACTED)
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

/// A recognized pattern occurrence in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptMatch {
    pub kind: PromptKind,
    pub start: usize,
    pub end: usize,
}

/// Compiled output patterns, in scan priority order
#[derive(Debug, Clone)]
pub struct PromptTable {
    patterns: Vec<(PromptKind, Regex)>,
}

impl PromptTable {
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        let mut patterns = Vec::new();

        for kind in PromptKind::PRIORITY {
            let sources = match kind {
                PromptKind::Error => &config.error,
                PromptKind::Success => &config.success,
                PromptKind::Password => &config.password,
                PromptKind::Confirmation => &config.confirmation,
            };
            for source in sources {
                let regex = Regex::new(source).map_err(|e| {
                    PerpError::Config(format!("prompts.{}: {}", kind.as_str().to_lowercase(), e))
                })?;
                patterns.push((kind, regex));
            }
        }

        Ok(Self { patterns })
    }

    /// Earliest match in `text`; ties go to the higher-priority kind
    pub fn earliest(&self, text: &str) -> Option<PromptMatch> {
        let mut best: Option<PromptMatch> = None;

        for (kind, regex) in &self.patterns {
            if let Some(m) = regex.find(text) {
                if best.map_or(true, |b| m.start() < b.start) {
                    best = Some(PromptMatch {
                        kind: *kind,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        }

        best
    }
}

/// Everything one session needs besides the prompt table
#[derive(Debug, Clone)]
pub struct SessionScript {
    /// Order name, for logs
    pub label: String,
    pub command: SubmissionCommand,
    pub secret: Secret,
    pub confirm_response: String,
    pub max_confirmations: u32,
    pub exit_grace: Duration,
}

impl SessionScript {
    pub fn new(
        label: impl Into<String>,
        command: SubmissionCommand,
        secret: Secret,
        orders: &OrdersConfig,
    ) -> Self {
        Self {
            label: label.into(),
            command,
            secret,
            confirm_response: orders.confirm_response.clone(),
            max_confirmations: orders.max_confirmations,
            exit_grace: orders.exit_grace(),
        }
    }
}

/// What a finished session produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: ExecutionResult,
    pub state: SessionState,
    pub pid: Option<u32>,
    /// Merged output with the secret redacted
    pub transcript: String,
    pub transitions: Vec<StateTransition>,
}

/// Single-use driver for one CLI invocation
pub struct ProcessSession {
    script: SessionScript,
    state: SessionState,
    transitions: Vec<StateTransition>,
}

impl ProcessSession {
    pub fn new(script: SessionScript) -> Self {
        Self {
            script,
            state: SessionState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, to: SessionState, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.state.can_transition_to(to) {
            warn!(
                "[{}] unexpected session transition {} -> {}",
                self.script.label, self.state, to
            );
        }
        debug!("[{}] {} -> {}: {}", self.script.label, self.state, to, reason);
        self.transitions
            .push(StateTransition::new(self.state, to, reason));
        self.state = to;
    }

    /// Spawn the CLI and drive it to a terminal state.
    ///
    /// `wait_bound` limits the wait for each recognized pattern and restarts
    /// after every match.
    pub async fn run(mut self, prompts: &PromptTable, wait_bound: Duration) -> SessionReport {
        let program = self.script.command.program.clone();

        let spawned = spawn_attached(&program, &self.script.command.args);

        let Attached {
            mut child,
            outputs,
            input,
        } = match spawned {
            Ok(attached) => attached,
            Err(e) => {
                self.transition(SessionState::Failed, "spawn failed");
                return self.finish(
                    ExecutionResult::ProcessError(SessionError::Spawn {
                        program,
                        reason: e.to_string(),
                    }),
                    None,
                    String::new(),
                );
            }
        };

        let pid = child.id();
        info!(
            "[{}] spawned {} (pid {})",
            self.script.label,
            program,
            pid.map_or_else(|| "?".to_string(), |p| p.to_string())
        );
        self.transition(SessionState::Spawned, "process started");

        let (tx, rx) = mpsc::unbounded_channel();
        let readers: Vec<JoinHandle<()>> = outputs
            .into_iter()
            .map(|output| spawn_reader(output, tx.clone()))
            .collect();
        drop(tx);

        let mut transcript = String::new();
        let outcome = self
            .drive(input, rx, prompts, wait_bound, &mut transcript)
            .await;

        let wait_for_exit = matches!(outcome, ExecutionResult::Confirmed { .. });
        release(&mut child, wait_for_exit, self.script.exit_grace).await;
        for reader in readers {
            reader.abort();
        }

        self.finish(outcome, pid, transcript)
    }

    async fn drive(
        &mut self,
        mut input: Option<InputStream>,
        mut output: mpsc::UnboundedReceiver<Vec<u8>>,
        prompts: &PromptTable,
        wait_bound: Duration,
        transcript: &mut String,
    ) -> ExecutionResult {
        let mut pending: Vec<u8> = Vec::new();
        let mut cursor = 0;
        let mut passwords = 0u32;
        let mut confirmations = 0u32;
        let mut deadline = Instant::now() + wait_bound;

        self.transition(SessionState::AwaitingPrompt, "reading output");

        loop {
            if let Some(found) = prompts.earliest(&transcript[cursor..]) {
                let start = cursor + found.start;
                let end = cursor + found.end;
                cursor = end;
                deadline = Instant::now() + wait_bound;
                self.transition(
                    SessionState::Matched(found.kind),
                    format!("matched {:?}", &transcript[start..end]),
                );

                match found.kind {
                    PromptKind::Error => {
                        let line = self.script.secret.redact(line_around(transcript, start, end));
                        self.transition(SessionState::Failed, "error marker");
                        return ExecutionResult::Rejected { reason: line };
                    }
                    PromptKind::Success => {
                        let line = self.script.secret.redact(line_around(transcript, start, end));
                        self.transition(SessionState::Completed, "success marker");
                        return ExecutionResult::Confirmed { detail: line };
                    }
                    PromptKind::Password => {
                        passwords += 1;
                        if passwords > 1 {
                            self.transition(SessionState::Failed, "password requested again");
                            return ExecutionResult::ProcessError(SessionError::PromptMismatch(
                                "password prompt repeated; credential rejected".to_string(),
                            ));
                        }
                        let line = Zeroizing::new(format!("{}\n", self.script.secret.expose()));
                        if let Err(e) = send_line(&mut input, &line).await {
                            self.transition(SessionState::Failed, "terminal write failed");
                            return ExecutionResult::ProcessError(e);
                        }
                    }
                    PromptKind::Confirmation => {
                        confirmations += 1;
                        if confirmations > self.script.max_confirmations {
                            self.transition(SessionState::Failed, "too many confirmations");
                            return ExecutionResult::ProcessError(SessionError::PromptMismatch(
                                format!(
                                    "more than {} confirmation prompts",
                                    self.script.max_confirmations
                                ),
                            ));
                        }
                        let line = format!("{}\n", self.script.confirm_response);
                        if let Err(e) = send_line(&mut input, &line).await {
                            self.transition(SessionState::Failed, "terminal write failed");
                            return ExecutionResult::ProcessError(e);
                        }
                    }
                }

                self.transition(SessionState::AwaitingPrompt, "response sent");
                continue;
            }

            match timeout_at(deadline, output.recv()).await {
                Ok(Some(chunk)) => {
                    pending.extend_from_slice(&chunk);
                    decode_utf8(&mut pending, transcript);
                }
                Ok(None) => {
                    self.transition(SessionState::Failed, "output closed");
                    return ExecutionResult::ProcessError(SessionError::PromptMismatch(
                        "process exited without a success or error marker".to_string(),
                    ));
                }
                Err(_) => {
                    self.transition(SessionState::TimedOut, "wait bound exceeded");
                    return ExecutionResult::TimedOut {
                        waited: wait_bound,
                        submitted: confirmations > 0,
                    };
                }
            }
        }
    }

    fn finish(
        self,
        outcome: ExecutionResult,
        pid: Option<u32>,
        transcript: String,
    ) -> SessionReport {
        SessionReport {
            outcome,
            state: self.state,
            pid,
            transcript: self.script.secret.redact(&transcript),
            transitions: self.transitions,
        }
    }
}

fn spawn_reader<R>(mut source: R, tx: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

async fn send_line(
    input: &mut Option<InputStream>,
    line: &str,
) -> std::result::Result<(), SessionError> {
    let writer = input
        .as_mut()
        .ok_or_else(|| SessionError::Io("terminal input is not available".to_string()))?;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| SessionError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| SessionError::Io(e.to_string()))
}

/// Move complete UTF-8 from `pending` into `out`, keeping a split trailing
/// character for the next chunk
fn decode_utf8(pending: &mut Vec<u8>, out: &mut String) {
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    None => {
                        pending.drain(..valid);
                        return;
                    }
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                }
            }
        }
    }
}

/// The full output line containing `start..end`, trimmed
fn line_around(text: &str, start: usize, end: usize) -> &str {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
    text[line_start..line_end].trim()
}

/// Stop the child and reap it.
///
/// With `wait_for_exit` the child first gets `exit_grace` to finish on its
/// own. Then SIGTERM, a short grace, and SIGKILL.
async fn release(child: &mut Child, wait_for_exit: bool, exit_grace: Duration) {
    if wait_for_exit {
        if let Ok(Ok(status)) = timeout(exit_grace, child.wait()).await {
            debug!("child exited with {}", status);
            return;
        }
    }

    if let Ok(Some(status)) = child.try_wait() {
        debug!("child already exited with {}", status);
        return;
    }

    terminate(child);
    if let Ok(Ok(status)) = timeout(TERMINATE_GRACE, child.wait()).await {
        debug!("child terminated with {}", status);
        return;
    }

    match child.kill().await {
        Ok(()) => debug!("child killed"),
        Err(e) => warn!("failed to kill child process: {}", e),
    }
}

/// The child leads its own process group, so helpers it started go too
#[cfg(unix)]
fn terminate(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!("SIGTERM to {} failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

/// Seam between the executor and real processes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Run one fresh session to completion
    async fn launch(&self, script: &SessionScript) -> ExecutionResult;
}

/// Launches real CLI processes
pub struct ProcessLauncher {
    prompts: Arc<PromptTable>,
    wait_bound: Duration,
}

impl ProcessLauncher {
    pub fn new(prompts: Arc<PromptTable>, wait_bound: Duration) -> Self {
        Self { prompts, wait_bound }
    }
}

#[async_trait]
impl SessionLauncher for ProcessLauncher {
    async fn launch(&self, script: &SessionScript) -> ExecutionResult {
        let report = ProcessSession::new(script.clone())
            .run(&self.prompts, self.wait_bound)
            .await;

        debug!(
            "[{}] session ended {} (pid {:?})\n{}",
            script.label, report.state, report.pid, report.transcript
        );
        report.outcome
    }
}
