// src/core/supervisor.rs
//! Owns one worker per user and the start / stop / status lifecycle.

use crate::connectors::traits::{CredentialProvider, GatewayFactory, SessionRecordStore, SettingsStore};
use crate::core::engine::{EngineConfig, TradingEngine};
use crate::error::{BotError, BotResult};
use crate::strategies::Strategy;
use crate::types::{BotSession, Credentials, StatusEvent, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub user_id: UserId,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Idle is the absence of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Acknowledged,
    StillRunningAfterTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub running: bool,
    pub phase: SessionPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

struct SessionEntry {
    handle: SessionHandle,
    phase: SessionPhase,
    stop_tx: watch::Sender<bool>,
    /// Never written; closes when the worker task ends, panics included.
    exited_rx: watch::Receiver<()>,
    task: JoinHandle<()>,
}

impl SessionEntry {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }
}

pub struct BotSupervisor {
    factory: Arc<dyn GatewayFactory>,
    strategy: Arc<dyn Strategy>,
    engine_config: EngineConfig,
    records: Arc<dyn SessionRecordStore>,
    default_investment: Decimal,
    status_sender: Option<mpsc::Sender<StatusEvent>>,
    sessions: Mutex<HashMap<UserId, SessionEntry>>,
}

impl BotSupervisor {
    pub fn new(
        factory: Arc<dyn GatewayFactory>,
        strategy: Arc<dyn Strategy>,
        engine_config: EngineConfig,
        records: Arc<dyn SessionRecordStore>,
        default_investment: Decimal,
    ) -> Self {
        Self {
            factory,
            strategy,
            engine_config,
            records,
            default_investment,
            status_sender: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_status_sender(mut self, sender: mpsc::Sender<StatusEvent>) -> Self {
        self.status_sender = Some(sender);
        self
    }

    /// Resolves credentials and reads the user's settings once, then starts.
    /// Later edits to the settings apply on the next start.
    pub async fn start_user(
        &self,
        user_id: UserId,
        credentials: &dyn CredentialProvider,
        settings: &dyn SettingsStore,
    ) -> BotResult<SessionHandle> {
        let creds = credentials.resolve(user_id).await?;
        let assets = settings.load_enabled_assets(user_id).await?;
        let mut investments = HashMap::with_capacity(assets.len());
        for symbol in &assets {
            let amount = settings.load_investment_amount(user_id, symbol).await?;
            investments.insert(symbol.clone(), amount);
        }
        let interval = settings.load_check_interval(user_id).await?;

        self.start(user_id, creds, assets, investments, interval).await
    }

    pub async fn start(
        &self,
        user_id: UserId,
        credentials: Credentials,
        enabled_assets: Vec<String>,
        investments: HashMap<String, Decimal>,
        interval_minutes: u32,
    ) -> BotResult<SessionHandle> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            return Err(BotError::InvalidInterval(interval_minutes));
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get(&user_id) {
            if entry.is_alive() {
                return Err(BotError::AlreadyRunning(user_id));
            }
            // leftover of a worker that already exited
            sessions.remove(&user_id);
        }

        let gateway = self.factory.connect(&credentials)?;
        let session = BotSession {
            user_id,
            assets: enabled_assets,
            investments,
            default_investment: self.default_investment,
            interval_minutes,
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(());
        let mut engine = TradingEngine::new(
            session,
            gateway,
            self.strategy.clone(),
            self.engine_config.clone(),
            stop_rx,
            self.status_sender.clone(),
        );

        let task = tokio::spawn(async move {
            let _exited = exited_tx;
            engine.run().await;
        });

        let handle = SessionHandle {
            user_id,
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        sessions.insert(
            user_id,
            SessionEntry {
                handle: handle.clone(),
                phase: SessionPhase::Running,
                stop_tx,
                exited_rx,
                task,
            },
        );
        drop(sessions);

        self.records.mark_running(user_id, handle.started_at).await;
        info!(user_id, session_id = %handle.session_id, "Session started");
        Ok(handle)
    }

    /// Signals the worker and waits up to `timeout` for it to exit. A worker
    /// stuck in a gateway call is left to finish on its own.
    pub async fn request_stop(&self, handle: &SessionHandle, timeout: Duration) -> StopOutcome {
        let mut exited = {
            let mut sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get_mut(&handle.user_id) else {
                return StopOutcome::Acknowledged;
            };
            if entry.handle.session_id != handle.session_id {
                // stale handle from an earlier session
                return StopOutcome::Acknowledged;
            }
            entry.phase = SessionPhase::Stopping;
            let _ = entry.stop_tx.send(true);
            entry.exited_rx.clone()
        };

        let finished = tokio::time::timeout(timeout, async {
            while exited.changed().await.is_ok() {}
        })
        .await
        .is_ok();

        if !finished {
            warn!(user_id = handle.user_id, "Worker did not stop within {:?}", timeout);
            return StopOutcome::StillRunningAfterTimeout;
        }

        self.unregister(handle).await;
        self.records.mark_stopped(handle.user_id, Utc::now()).await;
        info!(user_id = handle.user_id, "Session stopped");
        StopOutcome::Acknowledged
    }

    async fn unregister(&self, handle: &SessionHandle) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(&handle.user_id)
            .is_some_and(|e| e.handle.session_id == handle.session_id)
        {
            sessions.remove(&handle.user_id);
        }
    }

    /// Whether the user's worker is actually alive. A record that still says
    /// running after the worker died is corrected here.
    pub async fn status(&self, user_id: UserId) -> SessionStatus {
        let (alive, phase) = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(&user_id) {
                Some(entry) if entry.is_alive() => (true, entry.phase),
                Some(_) => {
                    sessions.remove(&user_id);
                    (false, SessionPhase::Idle)
                }
                None => (false, SessionPhase::Idle),
            }
        };

        let mut record = self.records.load(user_id).await.unwrap_or_default();
        if !alive && record.running {
            warn!("{}; correcting the record", BotError::StateInconsistency { user_id });
            let now = Utc::now();
            self.records.mark_stopped(user_id, now).await;
            record.running = false;
            record.stopped_at = Some(now);
        }

        SessionStatus {
            running: alive,
            phase,
            started_at: record.started_at,
            stopped_at: record.stopped_at,
        }
    }

    pub async fn active_sessions(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|e| e.is_alive())
            .map(|e| e.handle.clone())
            .collect()
    }

    /// Stops every session, used on shutdown.
    pub async fn shutdown(&self, timeout: Duration) {
        for handle in self.active_sessions().await {
            if self.request_stop(&handle, timeout).await == StopOutcome::StillRunningAfterTimeout {
                error!(user_id = handle.user_id, "Session still running at shutdown");
            }
        }
    }
}
