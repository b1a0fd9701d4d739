pub mod crossover;
pub mod rsi_bands;
pub mod traits;

use crate::config::{StrategyConfig, StrategyKind};
use crate::error::BotResult;
use std::sync::Arc;

pub use crossover::TwoStateCrossover;
pub use rsi_bands::ThreeStateRsi;
pub use traits::{Decision, DecisionInput, Strategy};

/// Picks the configured variant after checking its floors fit its order sizes.
pub fn build_strategy(config: &StrategyConfig) -> BotResult<Arc<dyn Strategy>> {
    match config.kind {
        StrategyKind::TwoState => {
            config.two_state.validate()?;
            Ok(Arc::new(TwoStateCrossover::new(&config.two_state)))
        }
        StrategyKind::ThreeState => {
            config.three_state.validate()?;
            Ok(Arc::new(ThreeStateRsi::new(&config.three_state)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_strategy_by_kind() {
        let mut config = StrategyConfig::default();
        assert_eq!(build_strategy(&config).unwrap().name(), "two_state_crossover");

        config.kind = StrategyKind::ThreeState;
        let strategy = build_strategy(&config).unwrap();
        assert_eq!(strategy.name(), "three_state_rsi");
        let thresholds = strategy.thresholds(dec!(10));
        assert_eq!(thresholds.partial_floor, Some(dec!(5)));
        assert_eq!(thresholds.full_floor, dec!(15));
    }

    #[test]
    fn test_build_strategy_rejects_overlapping_floors() {
        let mut config = StrategyConfig::default();
        config.kind = StrategyKind::ThreeState;
        config.three_state.full_floor_ratio = dec!(0.9);
        assert!(matches!(build_strategy(&config), Err(BotError::Config(_))));
    }
}
