//! Argument vector for the wallet CLI's `move tool run` submission

use std::fmt;

use crate::config::{NetworkConfig, WalletConfig};
use crate::domain::ResolvedOrder;
use crate::error::{PerpError, Result};

/// Referrer argument; no referrer is used
const NO_REFERRER: &str = "address:0x0";

/// Program plus arguments, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl SubmissionCommand {
    pub fn build(
        cli_command: &str,
        order: &ResolvedOrder,
        wallet: &WalletConfig,
        network_name: &str,
        network: &NetworkConfig,
    ) -> Result<Self> {
        let mut words = split_command(cli_command)?.into_iter();
        let program = words
            .next()
            .ok_or_else(|| PerpError::Config("cli_command must not be empty".to_string()))?;

        let rpc_url = network.rpc_url_for(network_name).ok_or_else(|| {
            PerpError::Config(format!("network '{}' has no rpc_url", network_name))
        })?;

        let mut args: Vec<String> = words.collect();
        args.extend([
            "move".to_string(),
            "tool".to_string(),
            "run".to_string(),
            "--function-id".to_string(),
            network.function_id(),
            "--args".to_string(),
            format!("address:{}", wallet.address),
            format!("u64:{}", order.size_units),
            format!("u64:{}", order.collateral_units),
            format!("u64:{}", order.price_units),
            format!("bool:{}", order.is_long),
            format!("bool:{}", order.is_increase),
            format!("bool:{}", order.is_market),
            format!("u64:{}", order.stop_loss_units),
            format!("u64:{}", order.take_profit_units),
            format!("bool:{}", order.can_execute_above_price),
            NO_REFERRER.to_string(),
            "--type-args".to_string(),
            network.pair_type(&order.type_arg),
            network.collateral_token.clone(),
            "--profile".to_string(),
            wallet.profile.clone(),
            "--rpc-url".to_string(),
            rpc_url,
        ]);

        Ok(Self { program, args })
    }
}

impl fmt::Display for SubmissionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(&self.args);
        write!(f, "{}", shell_words::join(words))
    }
}

/// Split a command line into words the way a POSIX shell would
pub fn split_command(line: &str) -> Result<Vec<String>> {
    shell_words::split(line).map_err(|e| PerpError::Config(format!("cli_command: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::template;
    use crate::domain::OrderAction;

    fn order() -> ResolvedOrder {
        ResolvedOrder {
            name: "Open LONG ETH".to_string(),
            action: OrderAction::MarketOpenLong,
            pair: "ETH_USD".to_string(),
            wallet: "trader_1".to_string(),
            type_arg: "ETH_USD".to_string(),
            is_long: true,
            is_increase: true,
            is_market: true,
            size_units: 300_000_000,
            collateral_units: 3_000_000,
            price_units: 35_000_000_000_000,
            stop_loss_units: 0,
            take_profit_units: 0,
            can_execute_above_price: false,
            wait_before_ms: 0,
        }
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("supra").unwrap(), vec!["supra"]);
        assert_eq!(
            split_command("  docker exec -it 'supra node'  supra ").unwrap(),
            vec!["docker", "exec", "-it", "supra node", "supra"]
        );
        assert_eq!(
            split_command(r#"a "b \"c\"" d\ e"#).unwrap(),
            vec!["a", "b \"c\"", "d e"]
        );
        assert_eq!(split_command("''").unwrap(), vec![""]);
        assert!(matches!(split_command("'open"), Err(PerpError::Config(_))));
    }

    #[test]
    fn test_display_quotes_for_copy_paste() {
        let cmd = SubmissionCommand {
            program: "supra".to_string(),
            args: vec![
                "--profile".to_string(),
                "my wallet".to_string(),
                "it's".to_string(),
                "u64:300000000".to_string(),
            ],
        };
        let shown = cmd.to_string();
        assert_eq!(
            split_command(&shown).unwrap(),
            ["supra", "--profile", "my wallet", "it's", "u64:300000000"]
        );
        assert!(shown.starts_with("supra --profile 'my wallet' "), "{}", shown);
    }

    #[test]
    fn test_submission_arguments() {
        let networks = template::default_networks();
        let wallets = template::default_wallets();
        let cmd = SubmissionCommand::build(
            "supra",
            &order(),
            &wallets["trader_1"],
            "testnet",
            &networks["testnet"],
        )
        .unwrap();

        assert_eq!(cmd.program, "supra");
        assert_eq!(&cmd.args[..4], ["move", "tool", "run", "--function-id"]);
        assert!(cmd.args[4].ends_with("::managed_trading::place_order_v3"));

        let args_at = cmd.args.iter().position(|a| a == "--args").unwrap();
        assert_eq!(
            &cmd.args[args_at + 1..args_at + 12],
            [
                "address:0xyourownaddresshere",
                "u64:300000000",
                "u64:3000000",
                "u64:35000000000000",
                "bool:true",
                "bool:true",
                "bool:true",
                "u64:0",
                "u64:0",
                "bool:false",
                "address:0x0",
            ]
        );

        let tail = &cmd.args[cmd.args.len() - 7..];
        assert_eq!(tail[0], "--type-args");
        assert!(tail[1].ends_with("::pair_types::ETH_USD"));
        assert!(tail[2].ends_with("::tusdc_coin::TUSDC"));
        assert_eq!(&tail[3..], ["--profile", "your_profile_name", "--rpc-url", "https://rpc-testnet.supra.com"]);
    }

    #[test]
    fn test_cli_command_prefix_words() {
        let networks = template::default_networks();
        let wallets = template::default_wallets();
        let cmd = SubmissionCommand::build(
            "docker exec supra_node supra",
            &order(),
            &wallets["trader_1"],
            "mainnet",
            &networks["mainnet"],
        )
        .unwrap();

        assert_eq!(cmd.program, "docker");
        assert_eq!(&cmd.args[..3], ["exec", "supra_node", "supra"]);
        assert!(cmd.to_string().contains("https://rpc-mainnet.supra.com"));
    }

    #[test]
    fn test_empty_cli_command_rejected() {
        let networks = template::default_networks();
        let wallets = template::default_wallets();
        let err = SubmissionCommand::build(
            "   ",
            &order(),
            &wallets["trader_1"],
            "testnet",
            &networks["testnet"],
        )
        .unwrap_err();
        assert!(matches!(err, PerpError::Config(_)));
    }
}
