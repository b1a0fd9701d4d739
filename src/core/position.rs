// src/core/position.rs
use crate::types::PositionState;
use rust_decimal::Decimal;
use tracing::warn;

/// USDT value floors that separate the exposure levels of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionThresholds {
    /// At or above this value the asset counts as totally positioned.
    pub full_floor: Decimal,
    /// Three-state only: at or above this value, partially positioned.
    pub partial_floor: Option<Decimal>,
}

impl PositionThresholds {
    pub fn two_state(full_floor: Decimal) -> Self {
        Self {
            full_floor,
            partial_floor: None,
        }
    }

    pub fn three_state(partial_floor: Decimal, full_floor: Decimal) -> Self {
        Self {
            full_floor,
            partial_floor: Some(partial_floor),
        }
    }
}

pub fn position_value(free_balance: Decimal, price: Decimal) -> Decimal {
    free_balance * price
}

pub fn classify(free_balance: Decimal, price: Decimal, thresholds: &PositionThresholds) -> PositionState {
    let value = position_value(free_balance, price);

    if value >= thresholds.full_floor {
        return PositionState::TotallyPositioned;
    }
    match thresholds.partial_floor {
        Some(floor) if value >= floor => PositionState::PartiallyPositioned,
        _ => PositionState::NotPositioned,
    }
}

/// The account always wins. A mismatch means an external fill or transfer
/// happened since the last tick.
pub fn reconcile(symbol: &str, stored: Option<PositionState>, derived: PositionState) -> PositionState {
    if let Some(previous) = stored {
        if previous != derived {
            warn!(
                symbol,
                "Position drift: stored state was {}, account says {}", previous, derived
            );
        }
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_two_state_classification() {
        let t = PositionThresholds::two_state(dec!(5));
        assert_eq!(classify(dec!(0.1), dec!(100), &t), PositionState::TotallyPositioned);
        assert_eq!(classify(dec!(0.05), dec!(100), &t), PositionState::TotallyPositioned);
        assert_eq!(classify(dec!(0.049), dec!(100), &t), PositionState::NotPositioned);
        assert_eq!(classify(Decimal::ZERO, dec!(100), &t), PositionState::NotPositioned);
    }

    #[test]
    fn test_three_state_classification() {
        let t = PositionThresholds::three_state(dec!(5), dec!(15));
        assert_eq!(classify(dec!(0.2), dec!(100), &t), PositionState::TotallyPositioned);
        assert_eq!(classify(dec!(0.1), dec!(100), &t), PositionState::PartiallyPositioned);
        assert_eq!(classify(dec!(0.01), dec!(100), &t), PositionState::NotPositioned);
    }

    #[test]
    fn test_reconcile_prefers_account() {
        let derived = reconcile(
            "BTCUSDT",
            Some(PositionState::TotallyPositioned),
            PositionState::NotPositioned,
        );
        assert_eq!(derived, PositionState::NotPositioned);
        assert_eq!(
            reconcile("BTCUSDT", None, PositionState::PartiallyPositioned),
            PositionState::PartiallyPositioned
        );
    }
}
