use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic order action declared by a strategy author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    MarketOpenLong,
    MarketOpenShort,
    LimitOpenLong,
    LimitOpenShort,
    MarketCloseLong,
    MarketCloseShort,
    LimitCloseLong,
    LimitCloseShort,
    AddToPosition,
    AddCollateral,
    PartialClose,
    FullClose,
    Custom,
}

/// Direction/intent/type flags carried by every on-chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionFlags {
    pub is_long: bool,
    pub is_increase: bool,
    pub is_market: bool,
}

impl ActionFlags {
    pub const fn new(is_long: bool, is_increase: bool, is_market: bool) -> Self {
        Self {
            is_long,
            is_increase,
            is_market,
        }
    }
}

impl OrderAction {
    /// Every action with a fixed flag table entry, in declaration order
    pub const TABLE: [OrderAction; 12] = [
        OrderAction::MarketOpenLong,
        OrderAction::MarketOpenShort,
        OrderAction::LimitOpenLong,
        OrderAction::LimitOpenShort,
        OrderAction::MarketCloseLong,
        OrderAction::MarketCloseShort,
        OrderAction::LimitCloseLong,
        OrderAction::LimitCloseShort,
        OrderAction::AddToPosition,
        OrderAction::AddCollateral,
        OrderAction::PartialClose,
        OrderAction::FullClose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::MarketOpenLong => "market_open_long",
            OrderAction::MarketOpenShort => "market_open_short",
            OrderAction::LimitOpenLong => "limit_open_long",
            OrderAction::LimitOpenShort => "limit_open_short",
            OrderAction::MarketCloseLong => "market_close_long",
            OrderAction::MarketCloseShort => "market_close_short",
            OrderAction::LimitCloseLong => "limit_close_long",
            OrderAction::LimitCloseShort => "limit_close_short",
            OrderAction::AddToPosition => "add_to_position",
            OrderAction::AddCollateral => "add_collateral",
            OrderAction::PartialClose => "partial_close",
            OrderAction::FullClose => "full_close",
            OrderAction::Custom => "custom",
        }
    }

    /// Flags implied by the action when the declaration does not override them.
    ///
    /// `Custom` has no table entry; its flags come from `custom_parameters`.
    pub fn default_flags(&self) -> Option<ActionFlags> {
        use OrderAction::*;

        let flags = match self {
            MarketOpenLong => ActionFlags::new(true, true, true),
            MarketOpenShort => ActionFlags::new(false, true, true),
            LimitOpenLong => ActionFlags::new(true, true, false),
            LimitOpenShort => ActionFlags::new(false, true, false),
            MarketCloseLong => ActionFlags::new(true, false, true),
            MarketCloseShort => ActionFlags::new(false, false, true),
            LimitCloseLong => ActionFlags::new(true, false, false),
            LimitCloseShort => ActionFlags::new(false, false, false),
            AddToPosition => ActionFlags::new(true, true, false),
            AddCollateral => ActionFlags::new(true, true, true),
            PartialClose => ActionFlags::new(true, false, false),
            FullClose => ActionFlags::new(true, false, true),
            Custom => return None,
        };
        Some(flags)
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution guard that keeps a fill on the favorable side of the reference price.
///
/// Opening a long or closing a short buys, so it must not execute above the
/// price; opening a short or closing a long sells, so it may.
pub fn infer_execution_guard(is_long: bool, is_increase: bool) -> bool {
    match (is_long, is_increase) {
        (true, true) => false,
        (false, true) => true,
        (true, false) => true,
        (false, false) => false,
    }
}

/// One strategy-file order entry, as written by the author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDeclaration {
    pub name: String,
    pub action: Option<OrderAction>,
    pub pair: String,
    pub wallet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds to wait before submitting this order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_before: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_units: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_units: Option<u64>,
    /// Limit/reference price in USD
    #[serde(default, alias = "price_usd", skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_units: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_units: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit_units: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_long: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_increase: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_market: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_execute_above_price: Option<bool>,

    /// Raw on-chain parameters; replaces field resolution entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_parameters: Option<serde_json::Value>,
}

/// Raw unit-denominated parameters of a `custom` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomParameters {
    pub size_units: u64,
    pub collateral_units: u64,
    pub price_units: u64,
    pub is_long: bool,
    pub is_increase: bool,
    pub is_market: bool,
    pub can_execute_above_price: bool,
    #[serde(default)]
    pub stop_loss_units: u64,
    #[serde(default)]
    pub take_profit_units: u64,
}

impl CustomParameters {
    pub const REQUIRED_FIELDS: [&'static str; 7] = [
        "size_units",
        "collateral_units",
        "price_units",
        "is_long",
        "is_increase",
        "is_market",
        "can_execute_above_price",
    ];
}

/// Fully concrete order in on-chain units, ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOrder {
    pub name: String,
    pub action: OrderAction,
    pub pair: String,
    pub wallet: String,
    /// Pair type argument passed to the contract
    pub type_arg: String,
    pub is_long: bool,
    pub is_increase: bool,
    pub is_market: bool,
    pub size_units: u64,
    pub collateral_units: u64,
    pub price_units: u64,
    /// 0 when unset
    pub stop_loss_units: u64,
    /// 0 when unset
    pub take_profit_units: u64,
    pub can_execute_above_price: bool,
    pub wait_before_ms: u64,
}

impl ResolvedOrder {
    pub fn flags(&self) -> ActionFlags {
        ActionFlags::new(self.is_long, self.is_increase, self.is_market)
    }

    pub fn side_label(&self) -> &'static str {
        match (self.is_long, self.is_increase) {
            (true, true) => "OPEN LONG",
            (false, true) => "OPEN SHORT",
            (true, false) => "CLOSE LONG",
            (false, false) => "CLOSE SHORT",
        }
    }

    pub fn order_type_label(&self) -> &'static str {
        if self.is_market {
            "MARKET"
        } else {
            "LIMIT"
        }
    }
}
