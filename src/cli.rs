use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::NetworkConfig;
use crate::domain::{from_units, CycleCount, ResolvedOrder, ScaleKind};
use crate::strategy::SubmissionCommand;

#[derive(Parser, Debug)]
#[command(name = "perpscript")]
#[command(author = "perpscript developers")]
#[command(version)]
#[command(about = "Scripted perpetual-futures orders through the supra wallet CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding config.json and the catalog files
    #[arg(short = 'd', long, global = true, default_value = ".")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a strategy (default)
    Run(StrategyArgs),
    /// Resolve a strategy and print the orders and CLI commands without executing
    Plan(StrategyArgs),
    /// Validate the configuration files
    Validate {
        /// Also validate strategies from this file
        #[arg(long)]
        strategy_file: Option<PathBuf>,
    },
    /// Write default configuration files
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Write field_reference.json describing every order field
    Reference,
}

/// Strategy selection shared by `run` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct StrategyArgs {
    /// Strategy name (defaults to config.json's default_strategy)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Number of cycles, -1 to repeat until stopped
    #[arg(short, long, allow_negative_numbers = true, value_parser = parse_cycles)]
    pub cycles: Option<CycleCount>,

    /// Load extra strategies from a JSON file
    #[arg(long)]
    pub strategy_file: Option<PathBuf>,

    /// Network override
    #[arg(short, long)]
    pub network: Option<String>,
}

fn parse_cycles(value: &str) -> std::result::Result<CycleCount, String> {
    let raw: i64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", value))?;
    CycleCount::from_i64(raw)
}

/// One resolved order as shown by `plan`
#[derive(Debug, Tabled)]
pub struct PlanRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub order: String,
    pub action: String,
    pub pair: String,
    pub wallet: String,
    pub side: String,
    #[tabled(rename = "type")]
    pub order_type: String,
    pub size_usd: String,
    pub collateral_usd: String,
    pub price_usd: String,
    pub guard: bool,
    pub wait_ms: u64,
}

impl PlanRow {
    pub fn new(index: usize, order: &ResolvedOrder, network: &NetworkConfig) -> Self {
        let usd = |units: u64, kind: ScaleKind| {
            from_units(units, network.scale(kind)).normalize().to_string()
        };

        Self {
            index,
            order: order.name.clone(),
            action: order.action.to_string(),
            pair: order.pair.clone(),
            wallet: order.wallet.clone(),
            side: order.side_label().to_string(),
            order_type: order.order_type_label().to_string(),
            size_usd: usd(order.size_units, ScaleKind::Size),
            collateral_usd: usd(order.collateral_units, ScaleKind::Collateral),
            price_usd: usd(order.price_units, ScaleKind::Price),
            guard: order.can_execute_above_price,
            wait_ms: order.wait_before_ms,
        }
    }
}

/// Render the plan table followed by the exact commands
pub fn render_plan(rows: &[PlanRow], commands: &[SubmissionCommand]) -> String {
    if rows.is_empty() {
        return "(no orders)".to_string();
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());

    let mut out = table.to_string();
    out.push_str("\n\nCommands:\n");
    for (index, command) in commands.iter().enumerate() {
        out.push_str(&format!("{:>3}. {}\n", index + 1, command));
    }
    out
}
