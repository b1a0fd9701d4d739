// src/strategies/crossover.rs
use crate::config::TwoStateConfig;
use crate::core::position::PositionThresholds;
use crate::core::sizer::{size_full_exit, size_order};
use crate::strategies::traits::{Decision, DecisionInput, Strategy};
use crate::types::{OrderRequest, PositionState, Side};
use rust_decimal::Decimal;

/// Moving-average crossover with two exposure levels: in or out.
pub struct TwoStateCrossover {
    full_floor_ratio: Decimal,
}

impl TwoStateCrossover {
    pub fn new(config: &TwoStateConfig) -> Self {
        Self {
            full_floor_ratio: config.full_floor_ratio,
        }
    }
}

impl Strategy for TwoStateCrossover {
    fn name(&self) -> &'static str {
        "two_state_crossover"
    }

    fn thresholds(&self, unit_notional: Decimal) -> PositionThresholds {
        PositionThresholds::two_state(unit_notional * self.full_floor_ratio)
    }

    fn decide(&self, input: &DecisionInput<'_>) -> Decision {
        let Some((short_ma, long_ma)) = input.indicators.moving_averages() else {
            return Decision::hold(input.state, "Insufficient data, no action");
        };

        if short_ma > long_ma && input.state != PositionState::TotallyPositioned {
            return match size_order(input.investment, input.price, input.lot, Side::Buy, None) {
                Ok(quantity) => Decision::trade(
                    PositionState::TotallyPositioned,
                    OrderRequest {
                        symbol: input.symbol.to_string(),
                        side: Side::Buy,
                        quantity,
                    },
                    "Buy placed",
                ),
                Err(e) => Decision::hold(input.state, format!("Cannot buy: {}", e)),
            };
        }

        if short_ma <= long_ma && input.state == PositionState::TotallyPositioned {
            return match size_full_exit(input.free_balance, input.price, input.lot) {
                Ok(quantity) => Decision::trade(
                    PositionState::NotPositioned,
                    OrderRequest {
                        symbol: input.symbol.to_string(),
                        side: Side::Sell,
                        quantity,
                    },
                    "Sell placed",
                ),
                Err(e) => Decision::hold(input.state, format!("Cannot sell: {}", e)),
            };
        }

        Decision::hold(input.state, "No action")
    }
}
