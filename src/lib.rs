//! Per-user trend-following spot trading core.
//!
//! Each user session runs one polling worker. Each tick walks the enabled
//! assets in order. For every asset the worker re-derives the position from
//! the account and computes moving averages and RSI. It then lets the
//! configured strategy decide and sends at most one market order.

pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod indicators;
pub mod strategies;
pub mod types;
pub mod utils;

pub use crate::core::engine::{EngineConfig, TradingEngine};
pub use crate::core::supervisor::{BotSupervisor, SessionHandle, SessionPhase, SessionStatus, StopOutcome};
pub use crate::error::{BotError, BotResult};
