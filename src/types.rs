// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exposure level to one asset, derived from the free balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionState {
    NotPositioned,
    PartiallyPositioned,
    TotallyPositioned,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PositionState::NotPositioned => "not positioned",
            PositionState::PartiallyPositioned => "partially positioned",
            PositionState::TotallyPositioned => "totally positioned",
        };
        f.write_str(label)
    }
}

/// Lot-size and notional rules of a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub step_size: Decimal,
    pub min_notional: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub close: Decimal,
    pub close_time: DateTime<Utc>,
}

/// Closing prices ordered by close time, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.close_time);
        Self { points }
    }

    pub fn from_closes(closes: &[Decimal]) -> Self {
        let start = DateTime::<Utc>::default();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                close: *close,
                close_time: start + chrono::Duration::minutes(i as i64),
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.close.to_f64().unwrap_or(f64::NAN))
            .collect()
    }
}

/// Last values of the rolling indicators. `None` until a window is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn moving_averages(&self) -> Option<(f64, f64)> {
        Some((self.short_ma?, self.long_ma?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    /// Already rescaled to the lot precision; `to_string()` is the wire form.
    pub quantity: Decimal,
}

impl OrderRequest {
    pub fn quantity_str(&self) -> String {
        self.quantity.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Free amount of `asset`, zero when the account holds none.
pub fn free_balance(balances: &[Balance], asset: &str) -> Decimal {
    balances
        .iter()
        .find(|b| b.asset == asset)
        .map(|b| b.free)
        .unwrap_or(Decimal::ZERO)
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Everything a worker needs for one user, read once at session start.
#[derive(Debug, Clone)]
pub struct BotSession {
    pub user_id: UserId,
    pub assets: Vec<String>,
    pub investments: HashMap<String, Decimal>,
    pub default_investment: Decimal,
    pub interval_minutes: u32,
}

impl BotSession {
    pub fn investment_for(&self, symbol: &str) -> Decimal {
        match self.investments.get(symbol) {
            Some(amount) if *amount > Decimal::ZERO => *amount,
            _ => self.default_investment,
        }
    }
}

/// Emitted by a worker after each processed asset.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub user_id: UserId,
    pub symbol: String,
    pub state: Option<PositionState>,
    pub message: String,
    pub order: Option<OrderResponse>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_investment_falls_back_to_default() {
        let session = BotSession {
            user_id: 1,
            assets: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            investments: HashMap::from([
                ("BTCUSDT".to_string(), dec!(25)),
                ("ETHUSDT".to_string(), dec!(0)),
            ]),
            default_investment: dec!(10),
            interval_minutes: 30,
        };

        assert_eq!(session.investment_for("BTCUSDT"), dec!(25));
        assert_eq!(session.investment_for("ETHUSDT"), dec!(10));
        assert_eq!(session.investment_for("SOLUSDT"), dec!(10));
    }

    #[test]
    fn test_free_balance_lookup() {
        let balances = vec![Balance {
            asset: "BNB".into(),
            free: dec!(0.5),
            locked: dec!(0),
        }];
        assert_eq!(free_balance(&balances, "BNB"), dec!(0.5));
        assert_eq!(free_balance(&balances, "SOL"), Decimal::ZERO);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials {
            api_key: "key".into(),
            api_secret: "secret".into(),
        };
        let out = format!("{:?}", creds);
        assert!(!out.contains("\"secret\""));
        assert!(!out.contains("\"key\""));
        assert!(out.contains("redacted"));
    }
}
