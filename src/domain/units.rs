//! USD ↔ on-chain unit conversion
//!
//! On-chain quantities are integers scaled by a per-network decimal count.
//! Size, collateral and price each carry their own scale; stop-loss and
//! take-profit are prices and share the price scale.

use crate::error::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest decimal scale a network may declare
pub const MAX_DECIMAL_SCALE: u32 = 18;

/// Field category used to pick a network decimal scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    Size,
    Collateral,
    Price,
}

impl ScaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleKind::Size => "size",
            ScaleKind::Collateral => "collateral",
            ScaleKind::Price => "price",
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convert a USD-denominated amount to integer units at `scale` decimals.
///
/// Rounds half away from zero. Negative amounts and results that do not fit
/// in `u64` are rejected.
pub fn to_units(
    field: &'static str,
    amount: Decimal,
    scale: u32,
) -> Result<u64, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::Negative {
            field,
            value: amount,
        });
    }

    let overflow = || ValidationError::Overflow {
        field,
        value: amount,
        scale,
    };

    if scale > MAX_DECIMAL_SCALE {
        return Err(overflow());
    }

    let factor = Decimal::from(10u64.pow(scale));
    amount
        .checked_mul(factor)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_u64())
        .ok_or_else(overflow)
}

/// Convert integer units back to a USD amount at `scale` decimals.
pub fn from_units(units: u64, scale: u32) -> Decimal {
    let scale = scale.min(MAX_DECIMAL_SCALE);
    // u64 has at most 20 digits, well inside Decimal's 96-bit mantissa
    Decimal::from_i128_with_scale(i128::from(units), scale).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_size_usd_to_testnet_units() {
        // 100 USD at 6 decimals
        assert_eq!(to_units("size_usd", dec!(100.0), 6).unwrap(), 100_000_000);
    }

    #[test]
    fn test_price_to_units() {
        // 3500 USD at 10 decimals
        assert_eq!(
            to_units("price", dec!(3500), 10).unwrap(),
            35_000_000_000_000
        );
    }

    #[test]
    fn test_rounds_to_nearest_unit() {
        assert_eq!(to_units("size_usd", dec!(0.0000015), 6).unwrap(), 2);
        assert_eq!(to_units("size_usd", dec!(0.0000014), 6).unwrap(), 1);
        assert_eq!(to_units("size_usd", dec!(0.0000005), 6).unwrap(), 1);
    }

    #[test]
    fn test_rejects_negative() {
        let err = to_units("collateral_usd", dec!(-1), 6).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Negative {
                field: "collateral_usd",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        assert_eq!(to_units("stop_loss", dec!(-0.0), 10).unwrap(), 0);
    }

    #[test]
    fn test_rejects_overflow() {
        let err = to_units("price", dec!(10000000000), 18).unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
    }

    #[test]
    fn test_from_units() {
        assert_eq!(from_units(100_000_000, 6), dec!(100));
        assert_eq!(from_units(35_000_000_000_000, 10), dec!(3500));
        assert_eq!(from_units(1, 6), dec!(0.000001));
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_one_unit(
            mantissa in 0i64..1_000_000_000,
            frac_digits in 0u32..8,
            scale in 0u32..=10,
        ) {
            let amount = Decimal::new(mantissa, frac_digits);
            let units = to_units("amount", amount, scale).unwrap();
            let back = from_units(units, scale);
            let one_unit = Decimal::new(1, scale);
            prop_assert!((back - amount).abs() <= one_unit);
        }
    }
}
