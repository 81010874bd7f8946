use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Strategy;
use crate::error::{PerpError, Result};

pub mod catalog;
pub mod template;

pub use catalog::{Catalog, NetworkConfig, PairConfig, WalletConfig};

/// Main config file name inside the config directory
pub const MAIN_CONFIG_FILE: &str = "config.json";

/// Main configuration structure (`config.json`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Network selected when neither the CLI nor the strategy names one
    #[serde(default = "default_network")]
    pub network: String,
    /// Strategy run when `--strategy` is omitted
    #[serde(default = "default_strategy_name")]
    pub default_strategy: String,
    /// External wallet CLI; may contain leading words (`docker exec node supra`)
    #[serde(default = "default_cli_command")]
    pub cli_command: String,
    /// Environment variable holding the CLI profile password
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub run: RunPolicyConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_strategy_name() -> String {
    "basic_cycle".to_string()
}

fn default_cli_command() -> String {
    "supra".to_string()
}

fn default_secret_env() -> String {
    "SUPRA_CLI_PASSWORD".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            default_strategy: default_strategy_name(),
            cli_command: default_cli_command(),
            secret_env: default_secret_env(),
            orders: OrdersConfig::default(),
            timing: TimingConfig::default(),
            run: RunPolicyConfig::default(),
            prompts: PromptConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
    /// Wait bound for each recognized prompt or marker, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Submission attempts per order (transient failures only)
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,
    /// Infer `can_execute_above_price` when the order leaves it out
    #[serde(default = "default_true")]
    pub auto_calculate_execution_guard: bool,
    /// Line sent in answer to a confirmation prompt
    #[serde(default = "default_confirm_response")]
    pub confirm_response: String,
    /// Confirmation prompts answered per session before giving up
    #[serde(default = "default_max_confirmations")]
    pub max_confirmations: u32,
    /// Grace period for the CLI to exit after its success marker
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,
}

fn default_timeout_secs() -> u64 {
    240
}

fn default_confirmation_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_confirm_response() -> String {
    "yes".to_string()
}

fn default_max_confirmations() -> u32 {
    5
}

fn default_exit_grace_ms() -> u64 {
    2000
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            confirmation_attempts: default_confirmation_attempts(),
            auto_calculate_execution_guard: true,
            confirm_response: default_confirm_response(),
            max_confirmations: default_max_confirmations(),
            exit_grace_ms: default_exit_grace_ms(),
        }
    }
}

impl OrdersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_sleep_between_orders")]
    pub sleep_between_orders_secs: u64,
    #[serde(default = "default_sleep_between_cycles")]
    pub sleep_between_cycles_secs: u64,
    /// Delay between submission attempts of one order
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_sleep_between_orders() -> u64 {
    6
}

fn default_sleep_between_cycles() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sleep_between_orders_secs: default_sleep_between_orders(),
            sleep_between_cycles_secs: default_sleep_between_cycles(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl TimingConfig {
    pub fn between_orders(&self) -> Duration {
        Duration::from_secs(self.sleep_between_orders_secs)
    }

    pub fn between_cycles(&self) -> Duration {
        Duration::from_secs(self.sleep_between_cycles_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// What the runner does when an order still fails after its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run with a non-zero exit
    Abort,
    /// Log and move on to the next order
    #[default]
    Continue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunPolicyConfig {
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Consecutive failed orders that end the run (0 = no limit)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for RunPolicyConfig {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::default(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Regex patterns recognized in the CLI output, per prompt kind
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    #[serde(default = "default_password_patterns")]
    pub password: Vec<String>,
    #[serde(default = "default_confirmation_patterns")]
    pub confirmation: Vec<String>,
    #[serde(default = "default_success_patterns")]
    pub success: Vec<String>,
    #[serde(default = "default_error_patterns")]
    pub error: Vec<String>,
}

fn default_password_patterns() -> Vec<String> {
    vec![
        r"[Pp]ass(word|phrase)".to_string(),
        r"Enter your password".to_string(),
        r"Profile passphrase".to_string(),
    ]
}

fn default_confirmation_patterns() -> Vec<String> {
    vec![
        r"\([Yy]/[Nn]\)".to_string(),
        r"(?i)do you want to (proceed|continue|submit)".to_string(),
        r"Press Enter".to_string(),
    ]
}

fn default_success_patterns() -> Vec<String> {
    vec![
        r#"(?i)"status"\s*:\s*"success""#.to_string(),
        r"(?i)\bexecuted successfully\b".to_string(),
        r"(?i)\btransaction (succeeded|executed)\b".to_string(),
    ]
}

fn default_error_patterns() -> Vec<String> {
    vec![
        r#"(?i)"status"\s*:\s*"fail"#.to_string(),
        r"(?i)\berror\b".to_string(),
        r"(?i)\baborted\b".to_string(),
    ]
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            password: default_password_patterns(),
            confirmation: default_confirmation_patterns(),
            success: default_success_patterns(),
            error: default_error_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Human-readable log file; disabled when empty
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_true")]
    pub console_output: bool,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// JSON-lines record of every order outcome
    #[serde(default = "default_run_log")]
    pub run_log: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "perpscript.log".to_string()
}

fn default_run_log() -> String {
    "perpscript_runs.jsonl".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: default_log_file(),
            console_output: true,
            json: false,
            run_log: default_run_log(),
        }
    }
}

impl AppConfig {
    /// Load `config.json` from a directory, then apply environment overrides
    /// (`PERPSCRIPT_NETWORK`, `PERPSCRIPT_ORDERS__TIMEOUT_SECS`, ...)
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        Self::load_file(config_dir.as_ref().join(MAIN_CONFIG_FILE))
    }

    /// Load a specific main config file; a missing file yields defaults
    pub fn load_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(
                File::from(path.as_ref())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("PERPSCRIPT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.cli_command.trim().is_empty() {
            errors.push("cli_command must not be empty".to_string());
        }

        if self.orders.timeout_secs == 0 {
            errors.push("orders.timeout_secs must be positive".to_string());
        }

        if self.orders.confirmation_attempts == 0 {
            errors.push("orders.confirmation_attempts must be at least 1".to_string());
        }

        for (kind, patterns) in [
            ("password", &self.prompts.password),
            ("confirmation", &self.prompts.confirmation),
            ("success", &self.prompts.success),
            ("error", &self.prompts.error),
        ] {
            for pattern in patterns {
                if let Err(e) = regex::Regex::new(pattern) {
                    errors.push(format!("prompts.{kind}: invalid pattern {pattern:?}: {e}"));
                }
            }
        }

        if self.prompts.success.is_empty() {
            errors.push("prompts.success needs at least one pattern".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Everything one run reads: main config plus the name-keyed catalogs.
///
/// Loaded once, validated, then shared read-only.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub config_dir: PathBuf,
    pub app: AppConfig,
    pub catalog: Catalog,
}

impl ConfigBundle {
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let app = AppConfig::load_from(&config_dir)?;
        let catalog = Catalog::load_from(&config_dir)?;

        Ok(Self {
            config_dir,
            app,
            catalog,
        })
    }

    pub fn new(app: AppConfig, catalog: Catalog) -> Self {
        Self {
            config_dir: PathBuf::from("."),
            app,
            catalog,
        }
    }

    /// Add strategies from a standalone file, replacing same-named ones
    pub fn merge_strategy_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<String>> {
        let added = catalog::read_strategy_file(path.as_ref())?;
        let names: Vec<String> = added.keys().cloned().collect();
        self.catalog.strategies.extend(added);
        Ok(names)
    }

    /// Validate the main config and every cross-reference in the catalogs
    pub fn validate(&self) -> Result<()> {
        let mut errors = match self.app.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if !self.catalog.networks.contains_key(&self.app.network) {
            errors.push(format!(
                "network '{}' not found in network configuration",
                self.app.network
            ));
        }

        if !self.catalog.strategies.contains_key(&self.app.default_strategy) {
            errors.push(format!(
                "strategy '{}' not found in strategies configuration",
                self.app.default_strategy
            ));
        }

        errors.extend(self.catalog.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PerpError::Config(errors.join("; ")))
        }
    }

    /// Strategy by name, or the configured default
    pub fn strategy(&self, name: Option<&str>) -> Result<(String, &Strategy)> {
        let name = name.unwrap_or(&self.app.default_strategy);
        self.catalog
            .strategies
            .get(name)
            .map(|strategy| (name.to_string(), strategy))
            .ok_or_else(|| {
                PerpError::Config(format!(
                    "strategy '{}' not found in strategies configuration",
                    name
                ))
            })
    }

    /// Resolve the network for a run: explicit override, then the
    /// strategy's own target, then the main config
    pub fn select_network(
        &self,
        override_name: Option<&str>,
        strategy: &Strategy,
    ) -> Result<(String, NetworkConfig)> {
        let name = override_name
            .or(strategy.network.as_deref())
            .unwrap_or(&self.app.network);

        self.catalog
            .networks
            .get(name)
            .map(|network| (name.to_string(), network.clone()))
            .ok_or_else(|| {
                PerpError::Config(format!(
                    "network '{}' not found in network configuration",
                    name
                ))
            })
    }
}
