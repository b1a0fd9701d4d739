// src/error.rs
use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    /// Network or exchange failure while reading data for one asset.
    #[error("market data unavailable for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    #[error("invalid lot: {0}")]
    InvalidLot(String),

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("could not resolve credentials for user {user_id}: {reason}")]
    CredentialResolution { user_id: UserId, reason: String },

    /// Record says running while no worker is alive. Healed, never returned.
    #[error("session record for user {user_id} says running but the worker is gone")]
    StateInconsistency { user_id: UserId },

    #[error("a session is already running for user {0}")]
    AlreadyRunning(UserId),

    #[error("check interval must be between 1 and 1440 minutes, got {0}")]
    InvalidInterval(u32),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    pub fn market_data(symbol: &str, reason: impl ToString) -> Self {
        BotError::MarketData {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn rejected(symbol: &str, reason: impl ToString) -> Self {
        BotError::OrderRejected {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;
