//! Name-keyed catalogs: networks, wallets, pairs and strategies.
//!
//! Each catalog lives in its own JSON file next to `config.json`. Keys are
//! case-sensitive names (`ETH_USD`, `trader_1`), so these files are read with
//! `serde_json` directly.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use super::template;
use crate::domain::{OrderAction, ScaleKind, Strategy, MAX_DECIMAL_SCALE};
use crate::error::{PerpError, Result};

pub const NETWORK_FILE: &str = "network.json";
pub const WALLETS_FILE: &str = "wallets.json";
pub const PAIRS_FILE: &str = "pairs.json";
pub const STRATEGIES_FILE: &str = "strategies.json";

/// Contract and unit settings for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub contract_address: String,
    pub collateral_token: String,
    pub size_decimals: u32,
    pub collateral_decimals: u32,
    pub price_decimals: u32,
    /// RPC endpoint; well-known networks fall back to their public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_function")]
    pub function: String,
    #[serde(default = "default_pair_module")]
    pub pair_module: String,
}

fn default_module() -> String {
    "managed_trading".to_string()
}

fn default_function() -> String {
    "place_order_v3".to_string()
}

fn default_pair_module() -> String {
    "pair_types".to_string()
}

/// Public RPC endpoint for a well-known network name
pub fn known_rpc_url(network: &str) -> Option<&'static str> {
    match network {
        "testnet" => Some("https://rpc-testnet.supra.com"),
        "mainnet" => Some("https://rpc-mainnet.supra.com"),
        _ => None,
    }
}

impl NetworkConfig {
    pub fn scale(&self, kind: ScaleKind) -> u32 {
        match kind {
            ScaleKind::Size => self.size_decimals,
            ScaleKind::Collateral => self.collateral_decimals,
            ScaleKind::Price => self.price_decimals,
        }
    }

    /// `<contract>::<module>::<function>`
    pub fn function_id(&self) -> String {
        format!("{}::{}::{}", self.contract_address, self.module, self.function)
    }

    /// Fully qualified pair type argument
    pub fn pair_type(&self, type_arg: &str) -> String {
        format!("{}::{}::{}", self.contract_address, self.pair_module, type_arg)
    }

    pub fn rpc_url_for(&self, network: &str) -> Option<String> {
        self.rpc_url
            .clone()
            .or_else(|| known_rpc_url(network).map(str::to_string))
    }
}

/// Signing wallet: on-chain address plus the CLI profile that holds its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    pub type_arg: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub available_testnet: bool,
    #[serde(default)]
    pub available_mainnet: bool,
    /// Additional network names the pair is listed on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default = "default_size_usd")]
    pub default_size_usd: Decimal,
    #[serde(default = "default_collateral_usd")]
    pub default_collateral_usd: Decimal,
    pub default_price: Decimal,
    #[serde(default)]
    pub min_size_usd: Decimal,
    #[serde(default = "default_max_size_usd")]
    pub max_size_usd: Decimal,
}

fn default_size_usd() -> Decimal {
    Decimal::from(300)
}

fn default_collateral_usd() -> Decimal {
    Decimal::from(3)
}

fn default_max_size_usd() -> Decimal {
    Decimal::from(500_000)
}

impl PairConfig {
    pub fn is_available_on(&self, network: &str) -> bool {
        match network {
            "testnet" if self.available_testnet => true,
            "mainnet" if self.available_mainnet => true,
            other => self.networks.iter().any(|n| n == other),
        }
    }
}

/// All name-keyed catalogs for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub networks: BTreeMap<String, NetworkConfig>,
    pub wallets: BTreeMap<String, WalletConfig>,
    pub pairs: BTreeMap<String, PairConfig>,
    pub strategies: BTreeMap<String, Strategy>,
}

impl Catalog {
    /// Built-in catalogs used when a file is absent
    pub fn defaults() -> Self {
        Self {
            networks: template::default_networks(),
            wallets: template::default_wallets(),
            pairs: template::default_pairs(),
            strategies: template::default_strategies(),
        }
    }

    pub fn load_from(config_dir: &Path) -> Result<Self> {
        Ok(Self {
            networks: read_or_default(&config_dir.join(NETWORK_FILE), template::default_networks)?,
            wallets: read_or_default(&config_dir.join(WALLETS_FILE), template::default_wallets)?,
            pairs: read_or_default(&config_dir.join(PAIRS_FILE), template::default_pairs)?,
            strategies: read_or_default(
                &config_dir.join(STRATEGIES_FILE),
                template::default_strategies,
            )?,
        })
    }

    pub fn wallet(&self, name: &str) -> Option<&WalletConfig> {
        self.wallets.get(name)
    }

    pub fn pair(&self, name: &str) -> Option<&PairConfig> {
        self.pairs.get(name)
    }

    /// Check scales, bounds and every strategy cross-reference
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, network) in &self.networks {
            for kind in [ScaleKind::Size, ScaleKind::Collateral, ScaleKind::Price] {
                let scale = network.scale(kind);
                if scale > MAX_DECIMAL_SCALE {
                    errors.push(format!(
                        "network '{name}': {kind}_decimals {scale} exceeds {MAX_DECIMAL_SCALE}"
                    ));
                }
            }
            if network.rpc_url_for(name).is_none() {
                errors.push(format!("network '{name}': rpc_url is required"));
            }
        }

        for (name, pair) in &self.pairs {
            if pair.min_size_usd > pair.max_size_usd {
                errors.push(format!(
                    "pair '{name}': min_size_usd {} exceeds max_size_usd {}",
                    pair.min_size_usd, pair.max_size_usd
                ));
            }
        }

        for (key, strategy) in &self.strategies {
            for (index, order) in strategy.orders.iter().enumerate() {
                let label = if order.name.is_empty() {
                    format!("#{}", index + 1)
                } else {
                    format!("'{}'", order.name)
                };

                if !self.pairs.contains_key(&order.pair) {
                    errors.push(format!(
                        "strategy '{key}' order {label}: unknown pair '{}'",
                        order.pair
                    ));
                }
                if !self.wallets.contains_key(&order.wallet) {
                    errors.push(format!(
                        "strategy '{key}' order {label}: unknown wallet '{}'",
                        order.wallet
                    ));
                }
                if order.action == Some(OrderAction::Custom) && order.custom_parameters.is_none() {
                    errors.push(format!(
                        "strategy '{key}' order {label}: custom action requires custom_parameters"
                    ));
                }
            }
        }

        errors
    }
}

fn read_or_default<T, F>(path: &Path, default: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        debug!("{} not found, using built-in defaults", path.display());
        return Ok(default());
    }

    let raw = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&raw).map_err(|e| {
        PerpError::Config(format!("failed to parse {}: {}", path.display(), e))
    })?;
    info!("Loaded config: {}", path.display());
    Ok(value)
}

/// Read a standalone strategy file.
///
/// Accepts either a name-keyed map of strategies or one strategy object,
/// which is registered under the file stem.
pub fn read_strategy_file(path: &Path) -> Result<BTreeMap<String, Strategy>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read strategy file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| PerpError::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    let parse_err =
        |e: serde_json::Error| PerpError::Config(format!("invalid strategy file {}: {}", path.display(), e));

    if value.get("orders").is_some() {
        let strategy: Strategy = serde_json::from_value(value).map_err(parse_err)?;
        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Ok(BTreeMap::from([(key, strategy)]))
    } else {
        serde_json::from_value(value).map_err(parse_err)
    }
}
