// src/strategies/rsi_bands.rs
use crate::config::ThreeStateConfig;
use crate::core::position::PositionThresholds;
use crate::core::sizer::{size_full_exit, size_order};
use crate::strategies::traits::{Decision, DecisionInput, Strategy};
use crate::types::{OrderRequest, PositionState, Side};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RsiBand {
    Oversold,
    Neutral,
    Overbought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Flat,
}

/// RSI band x moving-average relation x current exposure, with three
/// exposure levels. Partial size is one unit (the investment lifted to the
/// lot minimums), full size is `full_position_multiplier` units. The floors
/// scale with the unit so a fill always reads back as the state it claimed.
pub struct ThreeStateRsi {
    config: ThreeStateConfig,
}

impl ThreeStateRsi {
    pub fn new(config: &ThreeStateConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn band(&self, rsi: f64) -> RsiBand {
        if rsi <= self.config.oversold {
            RsiBand::Oversold
        } else if rsi >= self.config.overbought {
            RsiBand::Overbought
        } else {
            RsiBand::Neutral
        }
    }

    fn buy(
        &self,
        input: &DecisionInput<'_>,
        notional: Decimal,
        new_state: PositionState,
        message: &str,
    ) -> Decision {
        match size_order(notional, input.price, input.lot, Side::Buy, None) {
            Ok(quantity) => Decision::trade(new_state, order(input, Side::Buy, quantity), message),
            Err(e) => Decision::hold(input.state, format!("Cannot buy: {}", e)),
        }
    }

    fn sell(
        &self,
        input: &DecisionInput<'_>,
        notional: Decimal,
        new_state: PositionState,
        message: &str,
    ) -> Decision {
        let sized = size_order(
            notional,
            input.price,
            input.lot,
            Side::Sell,
            Some(input.free_balance),
        );
        match sized {
            Ok(quantity) => Decision::trade(new_state, order(input, Side::Sell, quantity), message),
            Err(e) => Decision::hold(input.state, format!("Cannot sell: {}", e)),
        }
    }

    fn sell_all(&self, input: &DecisionInput<'_>, message: &str) -> Decision {
        match size_full_exit(input.free_balance, input.price, input.lot) {
            Ok(quantity) => Decision::trade(
                PositionState::NotPositioned,
                order(input, Side::Sell, quantity),
                message,
            ),
            Err(e) => Decision::hold(input.state, format!("Cannot sell: {}", e)),
        }
    }
}

fn order(input: &DecisionInput<'_>, side: Side, quantity: Decimal) -> OrderRequest {
    OrderRequest {
        symbol: input.symbol.to_string(),
        side,
        quantity,
    }
}

impl Strategy for ThreeStateRsi {
    fn name(&self) -> &'static str {
        "three_state_rsi"
    }

    fn thresholds(&self, unit_notional: Decimal) -> PositionThresholds {
        PositionThresholds::three_state(
            unit_notional * self.config.partial_floor_ratio,
            unit_notional * self.config.full_floor_ratio,
        )
    }

    fn requires_rsi(&self) -> bool {
        true
    }

    fn decide(&self, input: &DecisionInput<'_>) -> Decision {
        use PositionState::*;

        let (Some((short_ma, long_ma)), Some(rsi)) =
            (input.indicators.moving_averages(), input.indicators.rsi)
        else {
            return Decision::hold(input.state, "Insufficient data, no action");
        };

        let trend = if short_ma > long_ma {
            Trend::Up
        } else if short_ma < long_ma {
            Trend::Down
        } else {
            Trend::Flat
        };

        let value = input.position_value();
        let partial = input.unit_notional();
        let full = partial * self.config.full_position_multiplier;
        let full_floor = partial * self.config.full_floor_ratio;
        let sell_floor = partial * self.config.sell_floor_ratio;

        match (self.band(rsi), trend, input.state) {
            (RsiBand::Neutral, Trend::Up, PartiallyPositioned) => {
                Decision::hold(input.state, "No buy: already partially positioned")
            }
            (RsiBand::Neutral, Trend::Up, NotPositioned) => self.buy(
                input,
                partial,
                PartiallyPositioned,
                "Partial buy placed (now partially positioned)",
            ),

            (RsiBand::Oversold, Trend::Down, PartiallyPositioned) => {
                Decision::hold(input.state, "No buy: already partially positioned")
            }
            (RsiBand::Oversold, Trend::Down, NotPositioned) => self.buy(
                input,
                partial,
                PartiallyPositioned,
                "Partial buy placed (now partially positioned)",
            ),
            (RsiBand::Oversold, Trend::Down, TotallyPositioned) => self.sell(
                input,
                partial,
                PartiallyPositioned,
                "Partial sell placed (now partially positioned)",
            ),
            (RsiBand::Oversold, Trend::Up, PartiallyPositioned) if value < full_floor => self.buy(
                input,
                partial,
                TotallyPositioned,
                "Additional buy placed (now totally positioned)",
            ),
            (RsiBand::Oversold, Trend::Up, NotPositioned) => self.buy(
                input,
                full,
                TotallyPositioned,
                "Full buy placed (now totally positioned)",
            ),

            (RsiBand::Overbought, Trend::Down, PartiallyPositioned) if value >= sell_floor => {
                self.sell_all(input, "Full sell placed (now not positioned)")
            }
            (RsiBand::Overbought, Trend::Down, TotallyPositioned) => {
                self.sell_all(input, "Full sell placed (now not positioned)")
            }
            (RsiBand::Overbought, Trend::Up, PartiallyPositioned)
                if value >= sell_floor && value < full_floor =>
            {
                Decision::hold(input.state, "No sell: already partially positioned")
            }
            (RsiBand::Overbought, Trend::Up, TotallyPositioned) => self.sell(
                input,
                partial,
                PartiallyPositioned,
                "Partial sell placed (now partially positioned)",
            ),
            (RsiBand::Overbought, Trend::Up, NotPositioned) => self.buy(
                input,
                partial,
                PartiallyPositioned,
                "Partial buy placed (now partially positioned)",
            ),

            _ => Decision::hold(input.state, "No action"),
        }
    }
}
