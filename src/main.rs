use clap::Parser;
use perpscript::cli::{render_plan, Cli, Commands, PlanRow, StrategyArgs};
use perpscript::config::{template, ConfigBundle};
use perpscript::coordination::{install_signal_handlers, StopSignal};
use perpscript::error::{PerpError, Result};
use perpscript::logging::{init_logging, init_logging_simple, run_log_path};
use perpscript::strategy::{
    ExecutorSettings, OrderExecutor, OrderResolver, ProcessLauncher, PromptTable, ResolverOptions,
    RunLog, RunnerSettings, Secret, StopReason, StrategyRunner, SubmissionCommand,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        None => run_strategy(&cli.config_dir, StrategyArgs::default()).await,
        Some(Commands::Run(args)) => run_strategy(&cli.config_dir, args).await,
        Some(Commands::Plan(args)) => {
            init_logging_simple();
            plan_strategy(&cli.config_dir, args)
        }
        Some(Commands::Validate { strategy_file }) => {
            init_logging_simple();
            validate_config(&cli.config_dir, strategy_file.as_deref())
        }
        Some(Commands::Init { force }) => {
            init_logging_simple();
            init_config(&cli.config_dir, force)
        }
        Some(Commands::Reference) => {
            init_logging_simple();
            template::write_field_reference(&cli.config_dir).map(|path| {
                println!("Wrote {}", path.display());
            })
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load, merge and validate everything a run or plan reads
fn load_bundle(config_dir: &Path, strategy_file: Option<&Path>) -> Result<ConfigBundle> {
    let mut bundle = ConfigBundle::load_from(config_dir)?;
    if let Some(path) = strategy_file {
        let names = bundle.merge_strategy_file(path)?;
        info!("Loaded strategies {:?} from {}", names, path.display());
    }
    bundle.validate()?;
    Ok(bundle)
}

async fn run_strategy(config_dir: &Path, args: StrategyArgs) -> Result<()> {
    let bundle = load_bundle(config_dir, args.strategy_file.as_deref())?;
    let _log_guard = init_logging(&bundle.app.logging, config_dir);

    let (key, strategy) = bundle.strategy(args.strategy.as_deref())?;
    let (network_name, network) = bundle.select_network(args.network.as_deref(), strategy)?;
    let cycles = args.cycles.unwrap_or(strategy.cycles);
    let secret = Secret::from_env(&bundle.app.secret_env)?;

    let prompts = Arc::new(PromptTable::from_config(&bundle.app.prompts)?);
    let launcher = Arc::new(ProcessLauncher::new(prompts, bundle.app.orders.timeout()));
    let executor = OrderExecutor::new(
        launcher,
        ExecutorSettings::from_config(&bundle.app, &network_name, &network),
        secret,
    );

    let run_log = RunLog::new(
        run_log_path(&bundle.app.logging, config_dir),
        strategy.label(&key),
        &network_name,
    );
    if let Some(path) = run_log.path() {
        info!("Recording outcomes to {}", path.display());
    }

    let stop = StopSignal::new();
    install_signal_handlers(stop.clone());

    let runner = StrategyRunner::new(
        bundle.catalog.clone(),
        executor,
        run_log,
        stop,
        RunnerSettings::from_config(&bundle.app),
    );

    let summary = runner.run(&key, strategy, cycles).await?;
    let stats = summary.stats;
    info!(
        "Run {} {}: {} cycle(s), {} confirmed, {} failed",
        summary.run_id,
        summary.stop_reason,
        summary.cycles_completed,
        stats.confirmed,
        stats.failed()
    );
    if summary.stop_reason == StopReason::Cancelled {
        warn!("Stopped before completing every cycle");
    }
    Ok(())
}

fn plan_strategy(config_dir: &Path, args: StrategyArgs) -> Result<()> {
    let bundle = load_bundle(config_dir, args.strategy_file.as_deref())?;
    let (key, strategy) = bundle.strategy(args.strategy.as_deref())?;
    let (network_name, network) = bundle.select_network(args.network.as_deref(), strategy)?;

    let resolver = OrderResolver::new(
        &network_name,
        &network,
        ResolverOptions::from(&bundle.app.orders),
    );
    let orders = resolver.resolve_all(strategy, &bundle.catalog)?;

    let mut rows = Vec::with_capacity(orders.len());
    let mut commands = Vec::with_capacity(orders.len());
    for (index, order) in orders.iter().enumerate() {
        let wallet = bundle.catalog.wallet(&order.wallet).ok_or_else(|| {
            PerpError::Config(format!("wallet '{}' not found", order.wallet))
        })?;
        rows.push(PlanRow::new(index + 1, order, &network));
        commands.push(SubmissionCommand::build(
            &bundle.app.cli_command,
            order,
            wallet,
            &network_name,
            &network,
        )?);
    }

    println!(
        "Strategy '{}' on {} ({} cycle(s))",
        strategy.label(&key),
        network_name,
        args.cycles.unwrap_or(strategy.cycles)
    );
    if !strategy.description.is_empty() {
        println!("{}", strategy.description);
    }
    println!();
    println!("{}", render_plan(&rows, &commands));
    Ok(())
}

fn validate_config(config_dir: &Path, strategy_file: Option<&Path>) -> Result<()> {
    let bundle = load_bundle(config_dir, strategy_file)?;

    println!("Configuration in {} is valid", config_dir.display());
    println!(
        "  {} network(s), {} wallet(s), {} pair(s), {} strategy(ies)",
        bundle.catalog.networks.len(),
        bundle.catalog.wallets.len(),
        bundle.catalog.pairs.len(),
        bundle.catalog.strategies.len()
    );
    println!(
        "  default: strategy '{}' on {}",
        bundle.app.default_strategy, bundle.app.network
    );
    Ok(())
}

fn init_config(config_dir: &Path, force: bool) -> Result<()> {
    for file in template::write_default_files(config_dir, force)? {
        if file.written {
            println!("Wrote {}", file.path.display());
        } else {
            println!("Kept existing {} (use --force to overwrite)", file.path.display());
        }
    }
    Ok(())
}
