// src/config.rs

use crate::error::{BotError, BotResult};
use crate::indicators::IndicatorParams;
use crate::types::UserId;
use config::{Config, ConfigError, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BinanceConfig {
    pub base_url: String,
    pub recv_window: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            recv_window: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TwoState,
    ThreeState,
}

/// Moving-average crossover. Floors are fractions of the notional of one
/// entry order, i.e. the investment after the lot minimums. Below
/// `full_floor_ratio` of it the asset counts as not positioned.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TwoStateConfig {
    pub full_floor_ratio: Decimal,
}

impl Default for TwoStateConfig {
    fn default() -> Self {
        Self {
            full_floor_ratio: Decimal::new(5, 1),
        }
    }
}

impl TwoStateConfig {
    /// A fresh buy must classify as totally positioned.
    pub fn validate(&self) -> BotResult<()> {
        if self.full_floor_ratio <= Decimal::ZERO || self.full_floor_ratio > Decimal::ONE {
            return Err(BotError::Config(format!(
                "two_state.full_floor_ratio must be in (0, 1], got {}",
                self.full_floor_ratio
            )));
        }
        Ok(())
    }
}

/// RSI bands crossed with the moving-average relation. A partial order is
/// worth one unit (the investment after the lot minimums), a full order
/// `full_position_multiplier` units. Floors are expressed in units too.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThreeStateConfig {
    pub partial_floor_ratio: Decimal,
    pub full_floor_ratio: Decimal,
    /// Minimum value before a partial position is closed on an overbought signal.
    pub sell_floor_ratio: Decimal,
    pub oversold: f64,
    pub overbought: f64,
    pub full_position_multiplier: Decimal,
}

impl Default for ThreeStateConfig {
    fn default() -> Self {
        Self {
            partial_floor_ratio: Decimal::new(5, 1),
            full_floor_ratio: Decimal::new(15, 1),
            sell_floor_ratio: Decimal::new(6, 1),
            oversold: 30.0,
            overbought: 70.0,
            full_position_multiplier: Decimal::from(2),
        }
    }
}

impl ThreeStateConfig {
    /// One unit must land in the partial tier. A full order, and a partial
    /// position topped up by one unit, must land in the full tier.
    pub fn validate(&self) -> BotResult<()> {
        let partial = self.partial_floor_ratio;
        let full = self.full_floor_ratio;
        let tiers_ok = partial > Decimal::ZERO
            && partial <= Decimal::ONE
            && full > Decimal::ONE
            && full <= partial + Decimal::ONE
            && full <= self.full_position_multiplier;
        if !tiers_ok {
            return Err(BotError::Config(format!(
                "three_state floors {} / {} do not fit a {}x full position",
                partial, full, self.full_position_multiplier
            )));
        }
        if !(0.0 < self.oversold && self.oversold < self.overbought && self.overbought < 100.0) {
            return Err(BotError::Config(format!(
                "three_state RSI bands must satisfy 0 < {} < {} < 100",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub kline_interval: String,
    pub kline_limit: u16,
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
    pub default_investment_usdt: Decimal,
    pub two_state: TwoStateConfig,
    pub three_state: ThreeStateConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let params = IndicatorParams::default();
        Self {
            kind: StrategyKind::TwoState,
            kline_interval: "30m".to_string(),
            kline_limit: 1000,
            short_window: params.short_window,
            long_window: params.long_window,
            rsi_period: params.rsi_period,
            default_investment_usdt: Decimal::from(10),
            two_state: TwoStateConfig::default(),
            three_state: ThreeStateConfig::default(),
        }
    }
}

impl StrategyConfig {
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            short_window: self.short_window,
            long_window: self.long_window,
            rsi_period: self.rsi_period,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub default_interval_minutes: u32,
    pub stop_timeout_secs: u64,
    /// Pause between two assets of the same pass.
    pub asset_pause_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: 30,
            stop_timeout_secs: 30,
            asset_pause_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    pub id: UserId,
    pub assets: Vec<String>,
    pub interval_minutes: Option<u32>,
    #[serde(default)]
    pub investments: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub binance: BinanceConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
