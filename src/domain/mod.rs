pub mod order;
pub mod outcome;
pub mod state;
pub mod strategy;
pub mod units;

pub use order::*;
pub use outcome::*;
pub use state::*;
pub use strategy::*;
pub use units::{from_units, to_units, ScaleKind, MAX_DECIMAL_SCALE};
