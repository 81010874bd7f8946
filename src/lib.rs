pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod logging;
pub mod strategy;

pub use config::{AppConfig, Catalog, ConfigBundle};
pub use coordination::{install_signal_handlers, StopSignal};
pub use domain::{CycleCount, ExecutionResult, OrderAction, OrderDeclaration, ResolvedOrder, Strategy};
pub use error::{PerpError, Result, SessionError, ValidationError};
pub use strategy::{
    OrderExecutor, OrderResolver, ProcessLauncher, RunLog, RunSummary, Secret, StopReason,
    StrategyRunner,
};
