use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::command::SubmissionCommand;
use crate::coordination::StopSignal;
use super::session::{Secret, SessionLauncher, SessionScript};
use crate::config::{AppConfig, NetworkConfig, OrdersConfig, WalletConfig};
use crate::domain::{ExecutionResult, ResolvedOrder};
use crate::error::Result;

/// Settings shared by every submission of a run
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub cli_command: String,
    pub network_name: String,
    pub network: NetworkConfig,
    pub orders: OrdersConfig,
    pub retry_delay: Duration,
}

impl ExecutorSettings {
    pub fn from_config(app: &AppConfig, network_name: &str, network: &NetworkConfig) -> Self {
        Self {
            cli_command: app.cli_command.clone(),
            network_name: network_name.to_string(),
            network: network.clone(),
            orders: app.orders.clone(),
            retry_delay: app.timing.retry_delay(),
        }
    }
}

/// Last outcome of an order plus how many sessions it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcome: ExecutionResult,
    pub attempts: u32,
}

/// Submits resolved orders, retrying spawn failures and unconfirmed timeouts
pub struct OrderExecutor {
    launcher: Arc<dyn SessionLauncher>,
    settings: ExecutorSettings,
    secret: Secret,
    stop: StopSignal,
}

impl OrderExecutor {
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: ExecutorSettings, secret: Secret) -> Self {
        Self {
            launcher,
            settings,
            secret,
            stop: StopSignal::new(),
        }
    }

    /// Give up pending retries once `stop` is requested
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// The argument vector an order would be submitted with
    pub fn command_for(&self, order: &ResolvedOrder, signer: &WalletConfig) -> Result<SubmissionCommand> {
        SubmissionCommand::build(
            &self.settings.cli_command,
            order,
            signer,
            &self.settings.network_name,
            &self.settings.network,
        )
    }

    /// Execute an order with up to `attempts` sessions.
    ///
    /// Only timeouts and spawn/pipe failures are retried; a rejection or an
    /// unexpected dialogue is returned immediately.
    pub async fn execute(
        &self,
        order: &ResolvedOrder,
        signer: &WalletConfig,
        attempts: u32,
    ) -> Result<ExecutionReport> {
        let max_attempts = attempts.max(1);
        let command = self.command_for(order, signer)?;
        let script = SessionScript::new(
            &order.name,
            command,
            self.secret.clone(),
            &self.settings.orders,
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(
                "[{}] {} {} {} via {} (attempt {}/{})",
                order.name,
                order.order_type_label(),
                order.side_label(),
                order.pair,
                signer.profile,
                attempt,
                max_attempts
            );

            let outcome = self.launcher.launch(&script).await;

            if outcome.is_confirmed() {
                info!("[{}] confirmed: {}", order.name, outcome.detail());
                return Ok(ExecutionReport {
                    outcome,
                    attempts: attempt,
                });
            }

            if !outcome.is_retryable() {
                error!("[{}] {} (not retried)", order.name, outcome);
                return Ok(ExecutionReport {
                    outcome,
                    attempts: attempt,
                });
            }

            if attempt >= max_attempts {
                error!(
                    "[{}] failed after {} attempts: {}",
                    order.name, attempt, outcome
                );
                return Ok(ExecutionReport {
                    outcome,
                    attempts: attempt,
                });
            }

            if self.stop.is_requested() {
                warn!("[{}] attempt {} failed: {}. Stop requested, not retrying", order.name, attempt, outcome);
                return Ok(ExecutionReport {
                    outcome,
                    attempts: attempt,
                });
            }

            warn!(
                "[{}] attempt {} failed: {}. Retrying in {:?}...",
                order.name, attempt, outcome, self.settings.retry_delay
            );
            if !self.stop.sleep(self.settings.retry_delay).await {
                warn!("[{}] stop requested during retry delay", order.name);
                return Ok(ExecutionReport {
                    outcome,
                    attempts: attempt,
                });
            }
        }
    }
}
