// src/utils/precision.rs
use rust_decimal::Decimal;

/// Rounds the quantity DOWN to the nearest multiple of step_size.
/// Example: amount=10.999, step=1.0 -> 10.0
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).floor() * step_size
}

/// Rounds the quantity UP to the nearest multiple of step_size.
/// Example: amount=0.0501, step=0.001 -> 0.051
pub fn ceil_to_step(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).ceil() * step_size
}

/// Decimal places a step size carries once trailing zeros are dropped.
/// 0.001 -> 3, 0.005 -> 3, 1.00 -> 0. Returns None for a non-positive step.
pub fn step_precision(step_size: Decimal) -> Option<u32> {
    if step_size <= Decimal::ZERO {
        return None;
    }
    Some(step_size.normalize().scale())
}

/// Fixes the scale so that `to_string()` prints exactly `precision` decimals.
pub fn with_precision(mut amount: Decimal, precision: u32) -> Decimal {
    amount.rescale(precision);
    amount
}
