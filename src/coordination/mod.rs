//! Run coordination: cooperative stop on Ctrl+C / SIGTERM

pub mod shutdown;

pub use shutdown::{install_signal_handlers, StopSignal};
