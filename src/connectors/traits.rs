// src/connectors/traits.rs
use crate::error::BotResult;
use crate::types::{AssetSpec, Balance, Credentials, OrderRequest, OrderResponse, PriceSeries, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Market data and order entry for one account.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn ticker_price(&self, symbol: &str) -> BotResult<Decimal>;

    async fn klines(&self, symbol: &str, interval: &str, limit: u16) -> BotResult<PriceSeries>;

    async fn symbol_info(&self, symbol: &str) -> BotResult<AssetSpec>;

    async fn account(&self) -> BotResult<Vec<Balance>>;

    /// Always a MARKET order.
    async fn create_order(&self, order: &OrderRequest) -> BotResult<OrderResponse>;
}

/// Builds a gateway bound to one user's keys.
pub trait GatewayFactory: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> BotResult<Arc<dyn MarketDataGateway>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_enabled_assets(&self, user_id: UserId) -> BotResult<Vec<String>>;

    async fn load_investment_amount(&self, user_id: UserId, symbol: &str) -> BotResult<Decimal>;

    async fn load_check_interval(&self, user_id: UserId) -> BotResult<u32>;
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> BotResult<Credentials>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// The caller's persisted "bot is running" flag.
#[async_trait]
pub trait SessionRecordStore: Send + Sync {
    async fn mark_running(&self, user_id: UserId, at: DateTime<Utc>);

    async fn mark_stopped(&self, user_id: UserId, at: DateTime<Utc>);

    async fn load(&self, user_id: UserId) -> Option<SessionRecord>;
}
