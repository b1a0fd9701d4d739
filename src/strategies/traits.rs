// src/strategies/traits.rs
use crate::core::position::PositionThresholds;
use crate::core::sizer::effective_notional;
use crate::types::{AssetSpec, IndicatorSnapshot, OrderRequest, PositionState};
use rust_decimal::Decimal;

/// Everything a strategy looks at for one asset in one tick.
#[derive(Debug, Clone)]
pub struct DecisionInput<'a> {
    pub symbol: &'a str,
    pub indicators: IndicatorSnapshot,
    pub state: PositionState,
    pub free_balance: Decimal,
    pub price: Decimal,
    pub investment: Decimal,
    pub lot: &'a AssetSpec,
}

impl DecisionInput<'_> {
    pub fn position_value(&self) -> Decimal {
        self.free_balance * self.price
    }

    /// Notional of one entry order: the investment lifted to the lot minimums.
    pub fn unit_notional(&self) -> Decimal {
        effective_notional(self.investment, self.price, self.lot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// State to adopt once `order` has been accepted by the exchange.
    pub new_state: PositionState,
    pub order: Option<OrderRequest>,
    pub message: String,
}

impl Decision {
    pub fn hold(state: PositionState, message: impl Into<String>) -> Self {
        Self {
            new_state: state,
            order: None,
            message: message.into(),
        }
    }

    pub fn trade(new_state: PositionState, order: OrderRequest, message: impl Into<String>) -> Self {
        Self {
            new_state,
            order: Some(order),
            message: message.into(),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.order.is_none()
    }
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Floors used to derive the position state from the account, for an
    /// asset whose entry order is worth `unit_notional`.
    fn thresholds(&self, unit_notional: Decimal) -> PositionThresholds;

    /// Whether a missing RSI means there is not enough data to decide.
    fn requires_rsi(&self) -> bool {
        false
    }

    /// Pure: no I/O, at most one order per call.
    fn decide(&self, input: &DecisionInput<'_>) -> Decision;
}
