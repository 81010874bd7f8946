//! Strategy runner: cycles over a strategy's orders, one submission at a time

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::executor::OrderExecutor;
use super::resolver::{OrderResolver, ResolverOptions};
use super::run_log::{RunLog, RunStats};
use crate::config::{AppConfig, Catalog, FailurePolicy};
use crate::coordination::StopSignal;
use crate::domain::{CycleCount, Strategy};
use crate::error::{PerpError, Result, ValidationError};

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub between_orders: Duration,
    pub between_cycles: Duration,
    /// Submission attempts per order
    pub attempts: u32,
    pub on_failure: FailurePolicy,
    /// 0 disables the limit
    pub max_consecutive_failures: u32,
    pub resolver: ResolverOptions,
}

impl RunnerSettings {
    pub fn from_config(app: &AppConfig) -> Self {
        Self {
            between_orders: app.timing.between_orders(),
            between_cycles: app.timing.between_cycles(),
            attempts: app.orders.confirmation_attempts,
            on_failure: app.run.on_failure,
            max_consecutive_failures: app.run.max_consecutive_failures,
            resolver: ResolverOptions::from(&app.orders),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every requested cycle ran
    Completed,
    /// A stop was requested
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub strategy: String,
    pub stop_reason: StopReason,
    pub cycles_completed: u64,
    pub stats: RunStats,
}

/// Drives one strategy through the executor
pub struct StrategyRunner {
    catalog: Catalog,
    executor: OrderExecutor,
    run_log: RunLog,
    stop: StopSignal,
    settings: RunnerSettings,
}

impl StrategyRunner {
    pub fn new(
        catalog: Catalog,
        executor: OrderExecutor,
        run_log: RunLog,
        stop: StopSignal,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            catalog,
            executor: executor.with_stop(stop.clone()),
            run_log,
            stop,
            settings,
        }
    }

    /// Run `strategy` for `cycles` passes.
    ///
    /// Every order is resolved before anything is submitted; a validation
    /// error at any point ends the run. Stops are honored between orders and
    /// during delays, never mid-submission.
    pub async fn run(&self, key: &str, strategy: &Strategy, cycles: CycleCount) -> Result<RunSummary> {
        let exec = self.executor.settings();
        let resolver = OrderResolver::new(&exec.network_name, &exec.network, self.settings.resolver);
        let label = strategy.label(key);

        if strategy.orders.is_empty() {
            return Err(PerpError::Config(format!("strategy '{}' has no orders", key)));
        }

        for declaration in &strategy.orders {
            if let Err(e) = resolver.resolve_in(declaration, &self.catalog) {
                return Err(self.validation_failed(0, declaration.name.as_str(), declaration.action, e).await);
            }
        }

        info!(
            "Starting strategy '{}' on {}: {} order(s), {} cycle(s), run {}",
            label,
            exec.network_name,
            strategy.orders.len(),
            cycles,
            self.run_log.run_id()
        );

        let last_index = strategy.orders.len() - 1;
        let mut completed: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        while cycles.allows(completed) {
            let cycle = completed + 1;
            info!("Cycle #{} of {}", cycle, cycles);

            for (index, declaration) in strategy.orders.iter().enumerate() {
                if self.stop.is_requested() {
                    return Ok(self.summary(label, StopReason::Cancelled, completed).await);
                }

                let order = match resolver.resolve_in(declaration, &self.catalog) {
                    Ok(order) => order,
                    Err(e) => {
                        return Err(self
                            .validation_failed(cycle, &declaration.name, declaration.action, e)
                            .await)
                    }
                };
                let signer = match self.catalog.wallet(&order.wallet) {
                    Some(wallet) => wallet,
                    None => {
                        let e = ValidationError::UnknownReference {
                            kind: "wallet",
                            name: order.wallet.clone(),
                        };
                        return Err(self
                            .validation_failed(cycle, &order.name, Some(order.action), e)
                            .await);
                    }
                };

                if order.wait_before_ms > 0 {
                    info!("[{}] waiting {}ms before submission", order.name, order.wait_before_ms);
                    if !self.stop.sleep(Duration::from_millis(order.wait_before_ms)).await {
                        return Ok(self.summary(label, StopReason::Cancelled, completed).await);
                    }
                }

                let report = self
                    .executor
                    .execute(&order, signer, self.settings.attempts)
                    .await?;
                self.run_log.record_execution(cycle, &order, &report).await;

                if report.outcome.is_confirmed() {
                    consecutive_failures = 0;
                } else {
                    consecutive_failures += 1;

                    if self.settings.on_failure == FailurePolicy::Abort {
                        error!("[{}] failed, aborting run", order.name);
                        return Err(PerpError::ExecutionFailed {
                            order: order.name.clone(),
                            attempts: report.attempts,
                            outcome: report.outcome.to_string(),
                        });
                    }

                    let threshold = self.settings.max_consecutive_failures;
                    if threshold > 0 && consecutive_failures >= threshold {
                        error!(
                            "{} consecutive failed orders, stopping run",
                            consecutive_failures
                        );
                        return Err(PerpError::ConsecutiveFailures {
                            count: consecutive_failures,
                            threshold,
                        });
                    }

                    warn!(
                        "[{}] failed ({} in a row), continuing",
                        order.name, consecutive_failures
                    );
                }

                if index < last_index && !self.stop.sleep(self.settings.between_orders).await {
                    return Ok(self.summary(label, StopReason::Cancelled, completed).await);
                }
            }

            completed += 1;
            let stats = self.run_log.stats().await;
            info!(
                "Cycle #{} done: {} confirmed, {} failed so far",
                cycle,
                stats.confirmed,
                stats.failed()
            );

            if !cycles.is_last(cycle) {
                info!("Sleeping {:?} before next cycle", self.settings.between_cycles);
                if !self.stop.sleep(self.settings.between_cycles).await {
                    return Ok(self.summary(label, StopReason::Cancelled, completed).await);
                }
            }
        }

        Ok(self.summary(label, StopReason::Completed, completed).await)
    }

    async fn validation_failed(
        &self,
        cycle: u64,
        order: &str,
        action: Option<crate::domain::OrderAction>,
        err: ValidationError,
    ) -> PerpError {
        error!("[{}] invalid order: {}", order, err);
        self.run_log.record_validation(cycle, order, action, &err).await;
        PerpError::validation(order, err)
    }

    async fn summary(&self, strategy: &str, stop_reason: StopReason, cycles_completed: u64) -> RunSummary {
        let summary = RunSummary {
            run_id: self.run_log.run_id(),
            strategy: strategy.to_string(),
            stop_reason,
            cycles_completed,
            stats: self.run_log.stats().await,
        };
        info!(
            "Strategy '{}' {}: {} cycle(s), {}/{} orders confirmed",
            summary.strategy,
            summary.stop_reason,
            summary.cycles_completed,
            summary.stats.confirmed,
            summary.stats.total()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrdersConfig;
    use crate::domain::ExecutionResult;
    use crate::strategy::executor::ExecutorSettings;
    use crate::strategy::session::{MockSessionLauncher, Secret};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn settings() -> RunnerSettings {
        RunnerSettings {
            between_orders: Duration::from_secs(6),
            between_cycles: Duration::from_secs(10),
            attempts: 1,
            on_failure: FailurePolicy::Continue,
            max_consecutive_failures: 0,
            resolver: ResolverOptions::default(),
        }
    }

    fn runner(launcher: MockSessionLauncher, settings: RunnerSettings, stop: StopSignal) -> StrategyRunner {
        let catalog = Catalog::defaults();
        let exec = ExecutorSettings {
            cli_command: "supra".to_string(),
            network_name: "testnet".to_string(),
            network: catalog.networks["testnet"].clone(),
            orders: OrdersConfig::default(),
            retry_delay: Duration::from_secs(5),
        };
        let executor = OrderExecutor::new(Arc::new(launcher), exec, Secret::new("pw"));
        StrategyRunner::new(
            catalog,
            executor,
            RunLog::new(None, "basic_cycle", "testnet"),
            stop,
            settings,
        )
    }

    fn basic_cycle() -> Strategy {
        Catalog::defaults().strategies["basic_cycle"].clone()
    }

    fn confirmed() -> ExecutionResult {
        ExecutionResult::Confirmed {
            detail: "executed successfully".to_string(),
        }
    }

    fn rejected() -> ExecutionResult {
        ExecutionResult::Rejected {
            reason: "Error: EINSUFFICIENT_BALANCE".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_cycles_two_orders() {
        let start = Instant::now();
        let launches: Arc<Mutex<Vec<(String, Duration)>>> = Arc::default();
        let seen = launches.clone();

        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(4).returning(move |script| {
            seen.lock().unwrap().push((script.label.clone(), start.elapsed()));
            confirmed()
        });

        let runner = runner(launcher, settings(), StopSignal::new());
        let summary = runner
            .run("basic_cycle", &basic_cycle(), CycleCount::Finite(2))
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Completed);
        assert_eq!(summary.cycles_completed, 2);
        assert_eq!(summary.stats.confirmed, 4);

        let launches = launches.lock().unwrap();
        let names: Vec<&str> = launches.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            [
                "Open LONG ETH - Market",
                "Open SHORT ETH - Market",
                "Open LONG ETH - Market",
                "Open SHORT ETH - Market",
            ]
        );

        // order delay inside a cycle, cycle delay between cycles, none at the end
        let secs: Vec<u64> = launches.iter().map(|(_, at)| at.as_secs()).collect();
        assert_eq!(secs, [0, 6, 16, 22]);
        let total = start.elapsed();
        assert!(total >= Duration::from_secs(22) && total < Duration::from_secs(23));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_between_orders() {
        let stop = StopSignal::new();
        let trigger = stop.clone();

        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(1).returning(move |_| {
            trigger.request("test");
            confirmed()
        });

        let runner = runner(launcher, settings(), stop);
        let summary = runner
            .run("basic_cycle", &basic_cycle(), CycleCount::Unbounded)
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.stats.total(), 1);
        assert_eq!(summary.cycles_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_order() {
        let stop = StopSignal::new();
        stop.request("test");

        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().never();

        let runner = runner(launcher, settings(), stop);
        let summary = runner
            .run("basic_cycle", &basic_cycle(), CycleCount::Finite(1))
            .await
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_policy() {
        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(1).returning(|_| rejected());

        let settings = RunnerSettings {
            on_failure: FailurePolicy::Abort,
            ..settings()
        };
        let err = runner(launcher, settings, StopSignal::new())
            .run("basic_cycle", &basic_cycle(), CycleCount::Finite(1))
            .await
            .unwrap_err();

        assert!(matches!(err, PerpError::ExecutionFailed { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_policy_keeps_going() {
        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(2).returning(|_| rejected());

        let summary = runner(launcher, settings(), StopSignal::new())
            .run("basic_cycle", &basic_cycle(), CycleCount::Finite(1))
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Completed);
        assert_eq!(summary.stats.rejected, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failure_limit() {
        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(3).returning(|_| rejected());

        let settings = RunnerSettings {
            max_consecutive_failures: 3,
            ..settings()
        };
        let err = runner(launcher, settings, StopSignal::new())
            .run("basic_cycle", &basic_cycle(), CycleCount::Unbounded)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PerpError::ConsecutiveFailures {
                count: 3,
                threshold: 3
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();

        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(4).returning(move |_| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            if *n % 2 == 0 {
                confirmed()
            } else {
                rejected()
            }
        });

        let settings = RunnerSettings {
            max_consecutive_failures: 2,
            ..settings()
        };
        let summary = runner(launcher, settings, StopSignal::new())
            .run("basic_cycle", &basic_cycle(), CycleCount::Finite(2))
            .await
            .unwrap();
        assert_eq!(summary.stats.confirmed, 2);
        assert_eq!(summary.stats.rejected, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_stops_before_any_submission() {
        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().never();

        let mut strategy = basic_cycle();
        strategy.orders[1].size_units = Some(300_000_000);

        let err = runner(launcher, settings(), StopSignal::new())
            .run("basic_cycle", &strategy, CycleCount::Finite(1))
            .await
            .unwrap_err();

        match err {
            PerpError::Validation { order, source } => {
                assert_eq!(order, "Open SHORT ETH - Market");
                assert!(matches!(source, ValidationError::Ambiguous { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_before_delays_submission() {
        let start = Instant::now();
        let launched_at = Arc::new(Mutex::new(None));
        let seen = launched_at.clone();

        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().times(1).returning(move |_| {
            *seen.lock().unwrap() = Some(start.elapsed());
            confirmed()
        });

        let mut strategy = basic_cycle();
        strategy.orders.truncate(1);
        strategy.orders[0].wait_before = Some(dec!(2.5));

        runner(launcher, settings(), StopSignal::new())
            .run("basic_cycle", &strategy, CycleCount::Finite(1))
            .await
            .unwrap();

        let at = launched_at.lock().unwrap().unwrap();
        assert!(at >= Duration::from_millis(2500) && at < Duration::from_millis(2600));
    }

    #[tokio::test]
    async fn test_empty_strategy_rejected() {
        let mut launcher = MockSessionLauncher::new();
        launcher.expect_launch().never();

        let strategy = Strategy {
            name: "empty".to_string(),
            ..Default::default()
        };
        let err = runner(launcher, settings(), StopSignal::new())
            .run("empty", &strategy, CycleCount::Finite(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PerpError::Config(_)));
    }
}
