//! Built-in defaults and config file generation (`init`, `reference`)

use anyhow::Context;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::catalog::{
    NetworkConfig, PairConfig, WalletConfig, NETWORK_FILE, PAIRS_FILE, STRATEGIES_FILE,
    WALLETS_FILE,
};
use super::{AppConfig, MAIN_CONFIG_FILE};
use crate::domain::{CycleCount, OrderAction, OrderDeclaration, Strategy};
use crate::error::Result;

pub const FIELD_REFERENCE_FILE: &str = "field_reference.json";

pub fn default_networks() -> BTreeMap<String, NetworkConfig> {
    let network = |contract: &str, collateral: &str, size: u32, coll: u32, price: u32| NetworkConfig {
        contract_address: contract.to_string(),
        collateral_token: collateral.to_string(),
        size_decimals: size,
        collateral_decimals: coll,
        price_decimals: price,
        rpc_url: None,
        module: "managed_trading".to_string(),
        function: "place_order_v3".to_string(),
        pair_module: "pair_types".to_string(),
    };

    BTreeMap::from([
        (
            "testnet".to_string(),
            network(
                "0xae38541466939b577823389765d966ba206b19be954fc87011fa10dc91e2fe0f",
                "0x4f316ce2960250e7ac1206a07d07b2cbef3897d3cb8c12369d30c08ecd39c61c::tusdc_coin::TUSDC",
                6,
                6,
                10,
            ),
        ),
        (
            "mainnet".to_string(),
            network(
                "0x215f242bec12c3d66b469668bc48b71e87fc1c7fd8e1764ac773423f0e2ba18b",
                "0x9176f70f125199a3e3d5549ce795a8e906eed75901d535ded623802f15ae3637::cdp_multi::CASH",
                8,
                8,
                10,
            ),
        ),
    ])
}

pub fn default_wallets() -> BTreeMap<String, WalletConfig> {
    BTreeMap::from([
        (
            "trader_1".to_string(),
            WalletConfig {
                address: "0xyourownaddresshere".to_string(),
                profile: "your_profile_name".to_string(),
                description: Some("Primary trading wallet".to_string()),
            },
        ),
        (
            "trader_2".to_string(),
            WalletConfig {
                address: "0xyoursecondaddresshere".to_string(),
                profile: "your_profile_name".to_string(),
                description: Some("Secondary trading wallet".to_string()),
            },
        ),
    ])
}

pub fn default_pairs() -> BTreeMap<String, PairConfig> {
    let pair = |symbol: &str, description: &str, price| PairConfig {
        type_arg: symbol.to_string(),
        description: description.to_string(),
        available_testnet: true,
        available_mainnet: true,
        networks: Vec::new(),
        default_size_usd: dec!(300),
        default_collateral_usd: dec!(3),
        default_price: price,
        min_size_usd: dec!(300),
        max_size_usd: dec!(500000),
    };

    BTreeMap::from([
        (
            "ETH_USD".to_string(),
            pair("ETH_USD", "Ethereum vs US Dollar", dec!(3500)),
        ),
        (
            "BTC_USD".to_string(),
            pair("BTC_USD", "Bitcoin vs US Dollar", dec!(50000)),
        ),
    ])
}

fn order(name: &str, action: OrderAction, wallet: &str) -> OrderDeclaration {
    OrderDeclaration {
        name: name.to_string(),
        action: Some(action),
        pair: "ETH_USD".to_string(),
        wallet: wallet.to_string(),
        ..Default::default()
    }
}

fn basic_cycle() -> Strategy {
    Strategy {
        name: "Basic ETH Open/Close Cycle".to_string(),
        description: "Simple cycle opening LONG and SHORT positions".to_string(),
        network: Some("testnet".to_string()),
        cycles: CycleCount::Unbounded,
        orders: vec![
            OrderDeclaration {
                size_usd: Some(dec!(300)),
                collateral_usd: Some(dec!(3)),
                price: Some(dec!(3500)),
                stop_loss: Some(dec!(3150)),
                take_profit: Some(dec!(3850)),
                description: Some("Open long position with market order".to_string()),
                ..order("Open LONG ETH - Market", OrderAction::MarketOpenLong, "trader_1")
            },
            OrderDeclaration {
                size_usd: Some(dec!(300)),
                collateral_usd: Some(dec!(3)),
                price: Some(dec!(3500)),
                stop_loss: Some(dec!(3850)),
                take_profit: Some(dec!(3150)),
                description: Some("Open short position with market order".to_string()),
                ..order("Open SHORT ETH - Market", OrderAction::MarketOpenShort, "trader_2")
            },
        ],
    }
}

fn custom_parameters(size: u64, collateral: u64, price: u64, sl: u64, tp: u64) -> serde_json::Value {
    json!({
        "size_units": size,
        "collateral_units": collateral,
        "price_units": price,
        "is_long": true,
        "is_increase": true,
        "is_market": false,
        "stop_loss_units": sl,
        "take_profit_units": tp,
        "can_execute_above_price": false
    })
}

fn fully_custom() -> Strategy {
    Strategy {
        name: "Fully Custom Orders Example".to_string(),
        description: "Every on-chain parameter given in raw units".to_string(),
        network: Some("testnet".to_string()),
        cycles: CycleCount::Finite(1),
        orders: vec![OrderDeclaration {
            custom_parameters: Some(custom_parameters(
                500_000_000,
                10_000_000,
                35_500_000_000_000,
                31_950_000_000_000,
                39_050_000_000_000,
            )),
            description: Some("Limit long with all fields specified in units".to_string()),
            ..order("Custom Limit Long", OrderAction::Custom, "trader_1")
        }],
    }
}

fn complete_examples() -> Strategy {
    Strategy {
        name: "Complete Field Examples".to_string(),
        description: "Shows every way an order field can be given".to_string(),
        network: Some("testnet".to_string()),
        cycles: CycleCount::Finite(1),
        orders: vec![
            OrderDeclaration {
                size_usd: Some(dec!(450)),
                collateral_usd: Some(dec!(75)),
                price: Some(dec!(3550)),
                stop_loss: Some(dec!(3195)),
                take_profit: Some(dec!(3905)),
                description: Some("USD amounts, converted to units".to_string()),
                ..order("USD-Based Market Long", OrderAction::MarketOpenLong, "trader_1")
            },
            OrderDeclaration {
                size_units: Some(750_000_000),
                collateral_units: Some(37_500_000),
                price_units: Some(36_000_000_000_000),
                stop_loss_units: Some(39_600_000_000_000),
                take_profit_units: Some(32_400_000_000_000),
                description: Some("Exact on-chain units".to_string()),
                ..order("Units-Based Limit Short", OrderAction::LimitOpenShort, "trader_2")
            },
            OrderDeclaration {
                size_usd: Some(dec!(300)),
                is_long: Some(false),
                is_market: Some(true),
                can_execute_above_price: Some(true),
                description: Some("Flags overridden by hand".to_string()),
                ..order("Manual Flags Override", OrderAction::AddToPosition, "trader_1")
            },
            OrderDeclaration {
                custom_parameters: Some(custom_parameters(
                    200_000_000,
                    100_000_000,
                    36_500_000_000_000,
                    32_850_000_000_000,
                    40_150_000_000_000,
                )),
                description: Some("Raw parameters, no resolution".to_string()),
                ..order("Fully Custom Raw Order", OrderAction::Custom, "trader_1")
            },
            OrderDeclaration {
                size_usd: Some(dec!(450)),
                wait_before: Some(dec!(10)),
                description: Some("Waits 10 seconds before submitting".to_string()),
                ..order("Delayed Order Execution", OrderAction::MarketCloseLong, "trader_1")
            },
        ],
    }
}

pub fn default_strategies() -> BTreeMap<String, Strategy> {
    BTreeMap::from([
        ("basic_cycle".to_string(), basic_cycle()),
        ("fully_custom".to_string(), fully_custom()),
        ("complete_examples".to_string(), complete_examples()),
    ])
}

/// Outcome of writing one generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    /// False when the file existed and was left untouched
    pub written: bool,
}

fn write_json<T: Serialize>(path: PathBuf, value: &T, force: bool) -> Result<GeneratedFile> {
    if path.exists() && !force {
        return Ok(GeneratedFile {
            path,
            written: false,
        });
    }

    let content = serde_json::to_string_pretty(value)?;
    fs::write(&path, content + "\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Generated {}", path.display());

    Ok(GeneratedFile {
        path,
        written: true,
    })
}

/// Write the five default config files into `dir`.
///
/// Existing files are kept unless `force` is set.
pub fn write_default_files(dir: &Path, force: bool) -> Result<Vec<GeneratedFile>> {
    fs::create_dir_all(dir)?;

    Ok(vec![
        write_json(dir.join(MAIN_CONFIG_FILE), &AppConfig::default(), force)?,
        write_json(dir.join(NETWORK_FILE), &default_networks(), force)?,
        write_json(dir.join(WALLETS_FILE), &default_wallets(), force)?,
        write_json(dir.join(PAIRS_FILE), &default_pairs(), force)?,
        write_json(dir.join(STRATEGIES_FILE), &default_strategies(), force)?,
    ])
}

fn field(kind: &str, required: bool, description: &str) -> serde_json::Value {
    json!({"type": kind, "required": required, "description": description})
}

/// Description of every order field plus example declarations
pub fn field_reference() -> serde_json::Value {
    let actions: Vec<&str> = OrderAction::TABLE
        .iter()
        .map(|a| a.as_str())
        .chain(std::iter::once(OrderAction::Custom.as_str()))
        .collect();

    json!({
        "order_field_reference": {
            "name": field("string", true, "Order name used in logs"),
            "action": {
                "type": "string",
                "required": true,
                "description": "Order action type",
                "options": actions
            },
            "pair": field("string", true, "Trading pair key from pairs.json"),
            "wallet": field("string", true, "Wallet key from wallets.json"),
            "description": field("string", false, "Free-form note"),
            "wait_before": field("number", false, "Seconds to wait before submitting this order"),
            "size_usd": field("number", false, "Position size in USD; defaults to the pair's default_size_usd"),
            "size_units": field("integer", false, "Position size in on-chain units; excludes size_usd"),
            "collateral_usd": field("number", false, "Collateral in USD; defaults to the pair's default_collateral_usd"),
            "collateral_units": field("integer", false, "Collateral in on-chain units; excludes collateral_usd"),
            "price": field("number", false, "Price in USD; defaults to the pair's default_price"),
            "price_units": field("integer", false, "Price in on-chain units; excludes price"),
            "stop_loss": field("number", false, "Stop loss price in USD; 0 or absent means none"),
            "stop_loss_units": field("integer", false, "Stop loss in on-chain units; excludes stop_loss"),
            "take_profit": field("number", false, "Take profit price in USD; 0 or absent means none"),
            "take_profit_units": field("integer", false, "Take profit in on-chain units; excludes take_profit"),
            "is_long": field("boolean", false, "LONG when true, SHORT when false; defaults from action"),
            "is_increase": field("boolean", false, "Open/add when true, close/reduce when false; defaults from action"),
            "is_market": field("boolean", false, "Market when true, limit when false; defaults from action"),
            "can_execute_above_price": field("boolean", false, "Execution guard; inferred from direction when absent"),
            "custom_parameters": field("object", false, "Raw on-chain parameters; replace all other quantity and flag fields")
        },
        "examples": {
            "simple_usd_based_order": {
                "name": "Simple USD-Based Order",
                "action": "market_open_long",
                "pair": "ETH_USD",
                "wallet": "trader_1",
                "size_usd": 300.0,
                "collateral_usd": 50.0,
                "price": 3500.0
            },
            "advanced_units_based_order": {
                "name": "Advanced Units-Based Order",
                "action": "limit_open_short",
                "pair": "ETH_USD",
                "wallet": "trader_2",
                "size_units": 500000000,
                "collateral_units": 25000000,
                "price_units": 36000000000000u64,
                "stop_loss_units": 39600000000000u64,
                "take_profit_units": 32400000000000u64,
                "is_long": false,
                "is_increase": true,
                "is_market": false,
                "can_execute_above_price": true
            },
            "completely_custom_order": {
                "name": "Completely Custom Order",
                "action": "custom",
                "pair": "ETH_USD",
                "wallet": "trader_1",
                "custom_parameters": {
                    "size_units": 100000000,
                    "collateral_units": 50000000,
                    "price_units": 35000000000000u64,
                    "is_long": true,
                    "is_increase": true,
                    "is_market": true,
                    "stop_loss_units": 31500000000000u64,
                    "take_profit_units": 38500000000000u64,
                    "can_execute_above_price": false
                }
            }
        }
    })
}

pub fn write_field_reference(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(FIELD_REFERENCE_FILE);
    write_json(path, &field_reference(), true).map(|generated| generated.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalog;

    #[test]
    fn test_init_writes_loadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let generated = write_default_files(dir.path(), false).unwrap();

        assert_eq!(generated.len(), 5);
        assert!(generated.iter().all(|g| g.written));

        let catalog = Catalog::load_from(dir.path()).unwrap();
        assert_eq!(catalog, Catalog::defaults());

        let app = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(app.default_strategy, "basic_cycle");
    }

    #[test]
    fn test_init_keeps_existing_files_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = dir.path().join(WALLETS_FILE);
        fs::write(&wallets, "{}").unwrap();

        let generated = write_default_files(dir.path(), false).unwrap();
        let kept = generated.iter().find(|g| g.path == wallets).unwrap();
        assert!(!kept.written);
        assert_eq!(fs::read_to_string(&wallets).unwrap(), "{}");

        write_default_files(dir.path(), true).unwrap();
        assert_ne!(fs::read_to_string(&wallets).unwrap(), "{}");
    }

    #[test]
    fn test_field_reference_lists_every_action() {
        let reference = field_reference();
        let options = reference["order_field_reference"]["action"]["options"]
            .as_array()
            .unwrap();
        assert_eq!(options.len(), 13);
        assert!(reference["examples"]["completely_custom_order"]["custom_parameters"].is_object());
    }
}
