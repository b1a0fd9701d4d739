//! Rolling moving averages and RSI over a closing-price series.
//!
//! Every column is aligned with the input series. A value is `None` until its
//! trailing window is filled, so nothing ever looks ahead.

use crate::error::{BotError, BotResult};
use crate::types::{IndicatorSnapshot, PriceSeries};
use serde::Deserialize;
use ta::indicators::SimpleMovingAverage;
use ta::Next;

pub const DEFAULT_SHORT_WINDOW: usize = 7;
pub const DEFAULT_LONG_WINDOW: usize = 40;
pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IndicatorParams {
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            rsi_period: DEFAULT_RSI_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverages {
    pub short: Vec<Option<f64>>,
    pub long: Vec<Option<f64>>,
}

/// Trailing arithmetic mean, `None` for the first `window - 1` entries.
fn rolling_mean(values: &[f64], window: usize) -> BotResult<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)
        .map_err(|_| BotError::Config(format!("invalid indicator window: {}", window)))?;

    Ok(values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mean = sma.next(value);
            (i + 1 >= window).then_some(mean)
        })
        .collect())
}

pub fn moving_averages(
    series: &PriceSeries,
    short_window: usize,
    long_window: usize,
) -> BotResult<MovingAverages> {
    let closes = series.closes();
    Ok(MovingAverages {
        short: rolling_mean(&closes, short_window)?,
        long: rolling_mean(&closes, long_window)?,
    })
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= f64::EPSILON {
        // no losses in the window: saturated, unless nothing moved at all
        return if avg_gain <= f64::EPSILON { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI from simple rolling means of gains and losses. Needs `period` deltas,
/// i.e. `period + 1` closes, before the first value.
pub fn rsi(series: &PriceSeries, period: usize) -> BotResult<Vec<Option<f64>>> {
    let closes = series.closes();
    if closes.is_empty() {
        return Ok(Vec::new());
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    let avg_gains = rolling_mean(&gains, period)?;
    let avg_losses = rolling_mean(&losses, period)?;

    let mut out = Vec::with_capacity(closes.len());
    out.push(None);
    out.extend(
        avg_gains
            .into_iter()
            .zip(avg_losses)
            .map(|(gain, loss)| Some(rsi_value(gain?, loss?))),
    );
    Ok(out)
}

/// Latest indicator values for a decision cycle.
pub fn snapshot(series: &PriceSeries, params: &IndicatorParams) -> BotResult<IndicatorSnapshot> {
    let mas = moving_averages(series, params.short_window, params.long_window)?;
    let rsi = rsi(series, params.rsi_period)?;

    Ok(IndicatorSnapshot {
        short_ma: mas.short.last().copied().flatten(),
        long_ma: mas.long.last().copied().flatten(),
        rsi: rsi.last().copied().flatten(),
    })
}
