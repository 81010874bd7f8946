//! Declaration → ResolvedOrder
//!
//! Every dynamic field goes through the same precedence pipeline: explicit
//! units, then USD converted at the network scale, then the pair default.
//! Resolution is all-or-nothing.

use rust_decimal::Decimal;

use crate::config::{Catalog, NetworkConfig, OrdersConfig, PairConfig};
use crate::domain::{
    from_units, infer_execution_guard, to_units, CustomParameters, OrderAction,
    OrderDeclaration, ResolvedOrder, ScaleKind, Strategy,
};
use crate::error::{PerpError, Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Infer the execution guard from direction when not declared;
    /// otherwise an undeclared guard is `true`
    pub auto_execution_guard: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            auto_execution_guard: true,
        }
    }
}

impl From<&OrdersConfig> for ResolverOptions {
    fn from(config: &OrdersConfig) -> Self {
        Self {
            auto_execution_guard: config.auto_calculate_execution_guard,
        }
    }
}

/// Resolves declarations against one selected network
#[derive(Debug, Clone)]
pub struct OrderResolver<'a> {
    network_name: &'a str,
    network: &'a NetworkConfig,
    options: ResolverOptions,
}

/// One quantity with its two mutually exclusive spellings
struct Quantity {
    name: &'static str,
    units_field: &'static str,
    usd_field: &'static str,
    scale: ScaleKind,
}

const SIZE: Quantity = Quantity {
    name: "size",
    units_field: "size_units",
    usd_field: "size_usd",
    scale: ScaleKind::Size,
};

const COLLATERAL: Quantity = Quantity {
    name: "collateral",
    units_field: "collateral_units",
    usd_field: "collateral_usd",
    scale: ScaleKind::Collateral,
};

const PRICE: Quantity = Quantity {
    name: "price",
    units_field: "price_units",
    usd_field: "price",
    scale: ScaleKind::Price,
};

const STOP_LOSS: Quantity = Quantity {
    name: "stop loss",
    units_field: "stop_loss_units",
    usd_field: "stop_loss",
    scale: ScaleKind::Price,
};

const TAKE_PROFIT: Quantity = Quantity {
    name: "take profit",
    units_field: "take_profit_units",
    usd_field: "take_profit",
    scale: ScaleKind::Price,
};

impl<'a> OrderResolver<'a> {
    pub fn new(network_name: &'a str, network: &'a NetworkConfig, options: ResolverOptions) -> Self {
        Self {
            network_name,
            network,
            options,
        }
    }

    /// Resolve a declaration whose pair and wallet are looked up in `catalog`
    pub fn resolve_in(
        &self,
        declaration: &OrderDeclaration,
        catalog: &Catalog,
    ) -> std::result::Result<ResolvedOrder, ValidationError> {
        let pair = catalog
            .pair(&declaration.pair)
            .ok_or_else(|| ValidationError::UnknownReference {
                kind: "pair",
                name: declaration.pair.clone(),
            })?;

        if catalog.wallet(&declaration.wallet).is_none() {
            return Err(ValidationError::UnknownReference {
                kind: "wallet",
                name: declaration.wallet.clone(),
            });
        }

        self.resolve(declaration, pair)
    }

    /// Resolve every order of a strategy up front; the first failure names its order
    pub fn resolve_all(&self, strategy: &Strategy, catalog: &Catalog) -> Result<Vec<ResolvedOrder>> {
        strategy
            .orders
            .iter()
            .map(|declaration| {
                self.resolve_in(declaration, catalog)
                    .map_err(|e| PerpError::validation(&declaration.name, e))
            })
            .collect()
    }

    pub fn resolve(
        &self,
        declaration: &OrderDeclaration,
        pair: &PairConfig,
    ) -> std::result::Result<ResolvedOrder, ValidationError> {
        let action = declaration
            .action
            .ok_or_else(|| ValidationError::MissingField("action".to_string()))?;

        if !pair.is_available_on(self.network_name) {
            return Err(ValidationError::PairUnavailable {
                pair: declaration.pair.clone(),
                network: self.network_name.to_string(),
            });
        }

        let wait_before_ms = match declaration.wait_before {
            Some(secs) => to_units("wait_before", secs, 3)?,
            None => 0,
        };

        let mut resolved = match &declaration.custom_parameters {
            // Raw parameters replace field resolution for any action
            Some(raw) => self.resolve_custom(declaration, action, pair, raw)?,
            None if action == OrderAction::Custom => {
                return Err(ValidationError::MissingField(
                    "custom_parameters".to_string(),
                ))
            }
            None => self.resolve_fields(declaration, action, pair)?,
        };
        resolved.wait_before_ms = wait_before_ms;

        Ok(resolved)
    }

    fn resolve_fields(
        &self,
        declaration: &OrderDeclaration,
        action: OrderAction,
        pair: &PairConfig,
    ) -> std::result::Result<ResolvedOrder, ValidationError> {
        let defaults = action
            .default_flags()
            .ok_or_else(|| ValidationError::MissingField("custom_parameters".to_string()))?;

        let is_long = declaration.is_long.unwrap_or(defaults.is_long);
        let is_increase = declaration.is_increase.unwrap_or(defaults.is_increase);
        let is_market = declaration.is_market.unwrap_or(defaults.is_market);

        let size_units = self.quantity(
            &SIZE,
            declaration.size_units,
            declaration.size_usd,
            Some(pair.default_size_usd),
        )?;
        let collateral_units = self.quantity(
            &COLLATERAL,
            declaration.collateral_units,
            declaration.collateral_usd,
            Some(pair.default_collateral_usd),
        )?;
        let price_units = self.quantity(
            &PRICE,
            declaration.price_units,
            declaration.price,
            Some(pair.default_price),
        )?;
        let stop_loss_units = self.quantity(
            &STOP_LOSS,
            declaration.stop_loss_units,
            declaration.stop_loss.filter(|v| *v > Decimal::ZERO),
            None,
        )?;
        let take_profit_units = self.quantity(
            &TAKE_PROFIT,
            declaration.take_profit_units,
            declaration.take_profit.filter(|v| *v > Decimal::ZERO),
            None,
        )?;

        self.check_bounds(size_units, pair)?;

        let can_execute_above_price = match declaration.can_execute_above_price {
            Some(explicit) => explicit,
            None if self.options.auto_execution_guard => infer_execution_guard(is_long, is_increase),
            None => true,
        };

        Ok(ResolvedOrder {
            name: declaration.name.clone(),
            action,
            pair: declaration.pair.clone(),
            wallet: declaration.wallet.clone(),
            type_arg: pair.type_arg.clone(),
            is_long,
            is_increase,
            is_market,
            size_units,
            collateral_units,
            price_units,
            stop_loss_units,
            take_profit_units,
            can_execute_above_price,
            wait_before_ms: 0,
        })
    }

    fn resolve_custom(
        &self,
        declaration: &OrderDeclaration,
        action: OrderAction,
        pair: &PairConfig,
        raw: &serde_json::Value,
    ) -> std::result::Result<ResolvedOrder, ValidationError> {
        let fields = raw.as_object().ok_or_else(|| {
            ValidationError::InvalidCustom("custom_parameters must be an object".to_string())
        })?;

        if let Some(missing) = CustomParameters::REQUIRED_FIELDS
            .iter()
            .find(|field| !fields.contains_key(**field))
        {
            return Err(ValidationError::MissingField(format!(
                "custom_parameters.{}",
                missing
            )));
        }

        let params: CustomParameters = serde_json::from_value(raw.clone())
            .map_err(|e| ValidationError::InvalidCustom(e.to_string()))?;

        Ok(ResolvedOrder {
            name: declaration.name.clone(),
            action,
            pair: declaration.pair.clone(),
            wallet: declaration.wallet.clone(),
            type_arg: pair.type_arg.clone(),
            is_long: params.is_long,
            is_increase: params.is_increase,
            is_market: params.is_market,
            size_units: params.size_units,
            collateral_units: params.collateral_units,
            price_units: params.price_units,
            stop_loss_units: params.stop_loss_units,
            take_profit_units: params.take_profit_units,
            can_execute_above_price: params.can_execute_above_price,
            wait_before_ms: 0,
        })
    }

    fn quantity(
        &self,
        quantity: &Quantity,
        units: Option<u64>,
        usd: Option<Decimal>,
        default_usd: Option<Decimal>,
    ) -> std::result::Result<u64, ValidationError> {
        let scale = self.network.scale(quantity.scale);

        match (units, usd) {
            (Some(_), Some(_)) => Err(ValidationError::Ambiguous {
                quantity: quantity.name,
                units_field: quantity.units_field,
                usd_field: quantity.usd_field,
            }),
            (Some(units), None) => Ok(units),
            (None, Some(usd)) => to_units(quantity.usd_field, usd, scale),
            (None, None) => match default_usd {
                Some(usd) => to_units(quantity.usd_field, usd, scale),
                None => Ok(0),
            },
        }
    }

    fn check_bounds(
        &self,
        size_units: u64,
        pair: &PairConfig,
    ) -> std::result::Result<(), ValidationError> {
        let size_usd = from_units(size_units, self.network.scale(ScaleKind::Size));

        if size_usd < pair.min_size_usd {
            return Err(ValidationError::BelowMinSize {
                size_usd,
                min: pair.min_size_usd,
            });
        }
        if size_usd > pair.max_size_usd {
            return Err(ValidationError::AboveMaxSize {
                size_usd,
                max: pair.max_size_usd,
            });
        }
        Ok(())
    }
}
