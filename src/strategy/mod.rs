//! Strategy execution
//!
//! Declarations are resolved into unit-denominated orders, turned into a CLI
//! argument vector, and submitted one at a time through a scripted session:
//!
//! - `resolver` - declaration + pair + network into a `ResolvedOrder`
//! - `command` - the `supra move tool run` argument vector
//! - `session` - prompt-driven dialogue with one CLI process
//! - `terminal` - spawning the CLI on its own pseudo-terminal
//! - `executor` - bounded retries around sessions
//! - `runner` - cycles, delays, failure policy and cancellation
//! - `run_log` - JSON-lines record of every outcome

pub mod command;
pub mod executor;
pub mod resolver;
pub mod run_log;
pub mod runner;
pub mod session;
pub mod terminal;

pub use command::{split_command, SubmissionCommand};
pub use executor::{ExecutionReport, ExecutorSettings, OrderExecutor};
pub use resolver::{OrderResolver, ResolverOptions};
pub use run_log::{RunLog, RunRecord, RunStats};
pub use runner::{RunSummary, RunnerSettings, StopReason, StrategyRunner};
pub use session::{
    ProcessLauncher, ProcessSession, PromptMatch, PromptTable, Secret, SessionLauncher,
    SessionReport, SessionScript,
};
