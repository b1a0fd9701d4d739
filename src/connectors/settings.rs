// src/connectors/settings.rs
//! Config- and environment-backed stand-ins for the settings database, the
//! credential vault and the bot status table.

use crate::config::{AppConfig, UserConfig};
use crate::connectors::traits::{CredentialProvider, SessionRecord, SessionRecordStore, SettingsStore};
use crate::error::{BotError, BotResult};
use crate::types::{Credentials, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

pub struct ConfigSettingsStore {
    users: HashMap<UserId, UserConfig>,
    default_interval_minutes: u32,
}

impl ConfigSettingsStore {
    pub fn new(config: &AppConfig) -> Self {
        let users = config
            .users
            .iter()
            .cloned()
            .map(|mut user| {
                // config keys may arrive lowercased
                user.assets = user.assets.iter().map(|s| s.to_uppercase()).collect();
                user.investments = user
                    .investments
                    .into_iter()
                    .map(|(symbol, amount)| (symbol.to_uppercase(), amount))
                    .collect();
                (user.id, user)
            })
            .collect();

        Self {
            users,
            default_interval_minutes: config.scheduler.default_interval_minutes,
        }
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn user(&self, user_id: UserId) -> BotResult<&UserConfig> {
        self.users
            .get(&user_id)
            .ok_or_else(|| BotError::Settings(format!("no settings for user {}", user_id)))
    }
}

#[async_trait]
impl SettingsStore for ConfigSettingsStore {
    async fn load_enabled_assets(&self, user_id: UserId) -> BotResult<Vec<String>> {
        Ok(self.user(user_id)?.assets.clone())
    }

    /// Zero when unset; the session falls back to the default investment.
    async fn load_investment_amount(&self, user_id: UserId, symbol: &str) -> BotResult<Decimal> {
        Ok(self
            .user(user_id)?
            .investments
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn load_check_interval(&self, user_id: UserId) -> BotResult<u32> {
        Ok(self
            .user(user_id)?
            .interval_minutes
            .unwrap_or(self.default_interval_minutes))
    }
}

/// Reads `BINANCE_API_KEY_<id>` / `BINANCE_SECRET_KEY_<id>`, falling back to
/// the unsuffixed variables.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

fn lookup(name: &str, user_id: UserId) -> Option<String> {
    env::var(format!("{}_{}", name, user_id))
        .or_else(|_| env::var(name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn resolve(&self, user_id: UserId) -> BotResult<Credentials> {
        let missing = |name: &str| BotError::CredentialResolution {
            user_id,
            reason: format!("{} is not set", name),
        };

        let api_key = lookup("BINANCE_API_KEY", user_id).ok_or_else(|| missing("BINANCE_API_KEY"))?;
        let api_secret =
            lookup("BINANCE_SECRET_KEY", user_id).ok_or_else(|| missing("BINANCE_SECRET_KEY"))?;

        Ok(Credentials {
            api_key,
            api_secret,
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionRecords {
    records: Mutex<HashMap<UserId, SessionRecord>>,
}

impl InMemorySessionRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<F: FnOnce(&mut SessionRecord)>(&self, user_id: UserId, f: F) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(records.entry(user_id).or_default());
    }
}

#[async_trait]
impl SessionRecordStore for InMemorySessionRecords {
    async fn mark_running(&self, user_id: UserId, at: DateTime<Utc>) {
        self.with_record(user_id, |record| {
            record.running = true;
            record.started_at = Some(at);
            record.stopped_at = None;
        });
    }

    async fn mark_stopped(&self, user_id: UserId, at: DateTime<Utc>) {
        self.with_record(user_id, |record| {
            record.running = false;
            record.stopped_at = Some(at);
        });
    }

    async fn load(&self, user_id: UserId) -> Option<SessionRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(&user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [scheduler]
            default_interval_minutes = 45

            [[users]]
            id = 3
            assets = ["bnbusdt", "SOLUSDT"]

            [users.investments]
            bnbusdt = "15"
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_settings_are_normalized() {
        let store = ConfigSettingsStore::new(&config());

        assert_eq!(store.user_ids(), vec![3]);
        assert_eq!(
            store.load_enabled_assets(3).await.unwrap(),
            vec!["BNBUSDT".to_string(), "SOLUSDT".to_string()]
        );
        assert_eq!(store.load_investment_amount(3, "BNBUSDT").await.unwrap(), dec!(15));
        assert_eq!(store.load_investment_amount(3, "SOLUSDT").await.unwrap(), Decimal::ZERO);
        assert_eq!(store.load_check_interval(3).await.unwrap(), 45);
    }

    #[tokio::test]
    async fn test_unknown_user_is_a_settings_error() {
        let store = ConfigSettingsStore::new(&config());
        assert!(matches!(store.load_enabled_assets(99).await, Err(BotError::Settings(_))));
    }

    #[tokio::test]
    async fn test_session_records_lifecycle() {
        let records = InMemorySessionRecords::new();
        assert!(records.load(1).await.is_none());

        let started = Utc::now();
        records.mark_running(1, started).await;
        let record = records.load(1).await.unwrap();
        assert!(record.running);
        assert_eq!(record.started_at, Some(started));

        records.mark_stopped(1, Utc::now()).await;
        let record = records.load(1).await.unwrap();
        assert!(!record.running);
        assert_eq!(record.started_at, Some(started));
        assert!(record.stopped_at.is_some());
    }
}
