// src/core/sizer.rs
//! Turns a USDT notional into an order quantity the exchange will accept.

use crate::error::{BotError, BotResult};
use crate::types::{AssetSpec, Side};
use crate::utils::precision::{ceil_to_step, normalize_quantity, step_precision, with_precision};
use rust_decimal::{Decimal, RoundingStrategy};

fn precision_of(lot: &AssetSpec) -> BotResult<u32> {
    step_precision(lot.step_size).ok_or_else(|| {
        BotError::InvalidLot(format!(
            "{} has a non-positive step size {}",
            lot.symbol, lot.step_size
        ))
    })
}

fn validate(quantity: Decimal, price: Decimal, lot: &AssetSpec) -> BotResult<()> {
    if quantity <= Decimal::ZERO || quantity < lot.min_qty {
        return Err(BotError::InvalidLot(format!(
            "{}: quantity {} is below the minimum {}",
            lot.symbol, quantity, lot.min_qty
        )));
    }
    let notional = quantity * price;
    if notional < lot.min_notional {
        return Err(BotError::InvalidLot(format!(
            "{}: order value {:.2} USDT is below the minimum notional {} USDT",
            lot.symbol, notional, lot.min_notional
        )));
    }
    Ok(())
}

/// Value an order for `target_notional` ends up with once the lot minimums
/// lift it. Position floors are scaled from this.
pub fn effective_notional(target_notional: Decimal, price: Decimal, lot: &AssetSpec) -> Decimal {
    target_notional.max(lot.min_notional).max(lot.min_qty * price)
}

/// Sizes an order worth `target_notional` at `price`.
///
/// The raw quantity is rounded to the step precision, lifted to `min_qty`,
/// then scaled up until it clears `min_notional`. Sells are capped to the free
/// balance floored to the step, so a position is never oversold.
pub fn size_order(
    target_notional: Decimal,
    price: Decimal,
    lot: &AssetSpec,
    side: Side,
    free_balance: Option<Decimal>,
) -> BotResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(BotError::InvalidLot(format!(
            "{}: cannot size an order at price {}",
            lot.symbol, price
        )));
    }
    if target_notional <= Decimal::ZERO {
        return Err(BotError::InvalidLot(format!(
            "{}: target notional must be positive, got {}",
            lot.symbol, target_notional
        )));
    }

    let precision = precision_of(lot)?;

    let mut quantity = (target_notional / price).round_dp(precision);
    quantity = quantity.max(lot.min_qty);

    if quantity * price < lot.min_notional {
        quantity = (lot.min_notional / price)
            .round_dp_with_strategy(precision, RoundingStrategy::ToPositiveInfinity);
    }

    quantity = ceil_to_step(quantity, lot.step_size);

    if lot.max_qty > Decimal::ZERO && quantity > lot.max_qty {
        quantity = normalize_quantity(lot.max_qty, lot.step_size);
    }

    if side == Side::Sell {
        let free = free_balance.ok_or_else(|| {
            BotError::InvalidLot(format!("{}: sell sizing needs the free balance", lot.symbol))
        })?;
        let cap = normalize_quantity(free, lot.step_size);
        if quantity > cap {
            quantity = cap;
        }
    }

    validate(quantity, price, lot)?;
    Ok(with_precision(quantity, precision))
}

/// Sells the whole free balance, floored to the step.
pub fn size_full_exit(free_balance: Decimal, price: Decimal, lot: &AssetSpec) -> BotResult<Decimal> {
    let precision = precision_of(lot)?;
    let mut quantity = normalize_quantity(free_balance, lot.step_size);

    if lot.max_qty > Decimal::ZERO && quantity > lot.max_qty {
        quantity = normalize_quantity(lot.max_qty, lot.step_size);
    }

    validate(quantity, price, lot)?;
    Ok(with_precision(quantity, precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot() -> AssetSpec {
        AssetSpec {
            symbol: "BNBUSDT".into(),
            base_asset: "BNB".into(),
            quote_asset: "USDT".into(),
            min_qty: dec!(0.001),
            max_qty: dec!(9000),
            step_size: dec!(0.001),
            min_notional: dec!(5),
        }
    }

    #[test]
    fn test_size_above_min_notional_is_unchanged() {
        let qty = size_order(dec!(10), dec!(100), &lot(), Side::Buy, None).unwrap();
        assert_eq!(qty.to_string(), "0.100");
    }

    #[test]
    fn test_size_scales_up_to_min_notional() {
        let qty = size_order(dec!(2), dec!(100), &lot(), Side::Buy, None).unwrap();
        assert_eq!(qty.to_string(), "0.050");
        assert_eq!(qty * dec!(100), dec!(5));
    }

    #[test]
    fn test_size_rounds_to_step_precision() {
        // 10 / 3 = 3.333.. -> 3.333
        let qty = size_order(dec!(10), dec!(3), &lot(), Side::Buy, None).unwrap();
        assert_eq!(qty.to_string(), "3.333");
    }

    #[test]
    fn test_size_respects_min_qty() {
        let mut spec = lot();
        spec.min_qty = dec!(0.5);
        spec.min_notional = dec!(1);
        let qty = size_order(dec!(10), dec!(100), &spec, Side::Buy, None).unwrap();
        assert_eq!(qty, dec!(0.5));
    }

    #[test]
    fn test_size_snaps_to_coarse_step() {
        let mut spec = lot();
        spec.step_size = dec!(5);
        spec.min_qty = dec!(5);
        spec.min_notional = dec!(1);
        // 72 is not a multiple of 5, rounds up to 75
        let qty = size_order(dec!(72), dec!(1), &spec, Side::Buy, None).unwrap();
        assert_eq!(qty, dec!(75));
    }

    #[test]
    fn test_sell_is_capped_to_free_balance() {
        let qty = size_order(dec!(10), dec!(100), &lot(), Side::Sell, Some(dec!(0.0789))).unwrap();
        assert_eq!(qty.to_string(), "0.078");
    }

    #[test]
    fn test_sell_below_min_notional_is_invalid() {
        let result = size_order(dec!(10), dec!(100), &lot(), Side::Sell, Some(dec!(0.02)));
        assert!(matches!(result, Err(BotError::InvalidLot(_))));
    }

    #[test]
    fn test_full_exit_floors_balance() {
        let qty = size_full_exit(dec!(0.12345), dec!(100), &lot()).unwrap();
        assert_eq!(qty.to_string(), "0.123");
    }

    #[test]
    fn test_non_decimal_step_keeps_the_snap() {
        let mut spec = lot();
        spec.step_size = dec!(0.005);
        spec.min_qty = dec!(0.005);

        // floored to 0.015, printed without rounding back up to the balance
        let exit = size_full_exit(dec!(0.017), dec!(1000), &spec).unwrap();
        assert_eq!(exit.to_string(), "0.015");

        let sell = size_order(dec!(20), dec!(1000), &spec, Side::Sell, Some(dec!(0.017))).unwrap();
        assert_eq!(sell.to_string(), "0.015");
    }

    #[test]
    fn test_full_exit_dust_is_invalid() {
        let result = size_full_exit(dec!(0.0004), dec!(100), &lot());
        assert!(matches!(result, Err(BotError::InvalidLot(_))));
    }

    #[test]
    fn test_effective_notional_applies_minimums() {
        assert_eq!(effective_notional(dec!(10), dec!(100), &lot()), dec!(10));
        assert_eq!(effective_notional(dec!(4), dec!(100), &lot()), dec!(5));

        let mut spec = lot();
        spec.min_qty = dec!(0.1);
        assert_eq!(effective_notional(dec!(4), dec!(100), &spec), dec!(10));
    }

    #[test]
    fn test_non_positive_price_is_invalid() {
        let result = size_order(dec!(10), Decimal::ZERO, &lot(), Side::Buy, None);
        assert!(matches!(result, Err(BotError::InvalidLot(_))));
    }
}
