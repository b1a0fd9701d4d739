// src/core/engine.rs
use crate::connectors::traits::MarketDataGateway;
use crate::core::position::{classify, position_value, reconcile};
use crate::core::sizer::effective_notional;
use crate::error::BotResult;
use crate::indicators::{self, IndicatorParams};
use crate::strategies::{DecisionInput, Strategy};
use crate::types::{free_balance, BotSession, OrderResponse, PositionState, StatusEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Per-session knobs that do not come from the user's settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kline_interval: String,
    pub kline_limit: u16,
    pub indicators: IndicatorParams,
    pub asset_pause: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kline_interval: "30m".to_string(),
            kline_limit: 1000,
            indicators: IndicatorParams::default(),
            asset_pause: Duration::ZERO,
        }
    }
}

/// What happened to one asset during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    /// An indicator the strategy needs is not defined yet.
    InsufficientData,
    Held {
        state: PositionState,
        message: String,
    },
    Executed {
        state: PositionState,
        order: OrderResponse,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEnd {
    Completed,
    Stopped,
}

/// One polling worker: owns a session and walks its assets in order.
pub struct TradingEngine {
    session: BotSession,
    gateway: Arc<dyn MarketDataGateway>,
    strategy: Arc<dyn Strategy>,
    config: EngineConfig,
    stop: watch::Receiver<bool>,
    status_sender: Option<mpsc::Sender<StatusEvent>>,
    states: HashMap<String, PositionState>,
}

impl TradingEngine {
    pub fn new(
        session: BotSession,
        gateway: Arc<dyn MarketDataGateway>,
        strategy: Arc<dyn Strategy>,
        config: EngineConfig,
        stop: watch::Receiver<bool>,
        status_sender: Option<mpsc::Sender<StatusEvent>>,
    ) -> Self {
        Self {
            session,
            gateway,
            strategy,
            config,
            stop,
            status_sender,
            states: HashMap::new(),
        }
    }

    pub fn state_of(&self, symbol: &str) -> Option<PositionState> {
        self.states.get(symbol).copied()
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Sleeps for `duration` unless a stop arrives first. Returns true on stop.
    async fn wait_or_stop(&mut self, duration: Duration) -> bool {
        if self.stop_requested() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            // a dropped sender also ends the session
            _ = self.stop.wait_for(|stop| *stop) => true,
        }
    }

    fn send_status(&self, event: StatusEvent) {
        let Some(sender) = &self.status_sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Status channel closed! Nobody is listening for session updates.");
            }
        }
    }

    pub async fn run(&mut self) {
        let user_id = self.session.user_id;
        info!(
            user_id,
            strategy = self.strategy.name(),
            assets = ?self.session.assets,
            interval_minutes = self.session.interval_minutes,
            "Engine starting..."
        );

        let interval = Duration::from_secs(u64::from(self.session.interval_minutes) * 60);
        loop {
            if self.run_pass().await == PassEnd::Stopped {
                break;
            }
            if self.wait_or_stop(interval).await {
                break;
            }
        }

        info!(user_id, "Engine stopped");
    }

    /// Processes every asset once, in the session's order.
    pub async fn run_pass(&mut self) -> PassEnd {
        let user_id = self.session.user_id;
        let assets = self.session.assets.clone();

        for (i, symbol) in assets.iter().enumerate() {
            if self.stop_requested() {
                info!(user_id, next = %symbol, "Stop requested, ending pass early");
                return PassEnd::Stopped;
            }
            if i > 0 && !self.config.asset_pause.is_zero() && self.wait_or_stop(self.config.asset_pause).await {
                return PassEnd::Stopped;
            }

            let event = match self.process_asset(symbol).await {
                Ok(AssetOutcome::InsufficientData) => {
                    debug!(user_id, symbol = %symbol, "Not enough history for indicators, skipping");
                    continue;
                }
                Ok(AssetOutcome::Held { state, message }) => {
                    info!(user_id, symbol = %symbol, state = %state, "{}", message);
                    self.status(symbol, Some(state), message, None)
                }
                Ok(AssetOutcome::Executed { state, order, message }) => {
                    info!(user_id, symbol = %symbol, state = %state, order_id = %order.id, "✅ {}", message);
                    self.status(symbol, Some(state), message, Some(order))
                }
                Err(e) => {
                    warn!(user_id, symbol = %symbol, "⚠️ {}", e);
                    self.status(symbol, self.state_of(symbol), e.to_string(), None)
                }
            };
            self.send_status(event);
        }

        self.log_quote_balance().await;
        PassEnd::Completed
    }

    fn status(
        &self,
        symbol: &str,
        state: Option<PositionState>,
        message: String,
        order: Option<OrderResponse>,
    ) -> StatusEvent {
        StatusEvent {
            user_id: self.session.user_id,
            symbol: symbol.to_string(),
            state,
            message,
            order,
            timestamp: Utc::now(),
        }
    }

    async fn process_asset(&mut self, symbol: &str) -> BotResult<AssetOutcome> {
        let lot = self.gateway.symbol_info(symbol).await?;
        let price = self.gateway.ticker_price(symbol).await?;
        let balances = self.gateway.account().await?;
        let free = free_balance(&balances, &lot.base_asset);

        let investment = self.session.investment_for(symbol);
        let unit = effective_notional(investment, price, &lot);
        let derived = classify(free, price, &self.strategy.thresholds(unit));
        let state = reconcile(symbol, self.states.get(symbol).copied(), derived);
        self.states.insert(symbol.to_string(), state);

        let series = self
            .gateway
            .klines(symbol, &self.config.kline_interval, self.config.kline_limit)
            .await?;
        let snapshot = indicators::snapshot(&series, &self.config.indicators)?;

        if snapshot.moving_averages().is_none() || (self.strategy.requires_rsi() && snapshot.rsi.is_none()) {
            return Ok(AssetOutcome::InsufficientData);
        }

        debug!(
            symbol,
            price = %price,
            value_usdt = %position_value(free, price),
            short_ma = ?snapshot.short_ma,
            long_ma = ?snapshot.long_ma,
            rsi = ?snapshot.rsi,
            "Indicators"
        );

        let decision = self.strategy.decide(&DecisionInput {
            symbol,
            indicators: snapshot,
            state,
            free_balance: free,
            price,
            investment,
            lot: &lot,
        });

        let Some(order) = decision.order else {
            return Ok(AssetOutcome::Held {
                state,
                message: decision.message,
            });
        };

        // no state change unless the exchange accepts the order
        let response = self.gateway.create_order(&order).await.map_err(|e| {
            error!(symbol, side = %order.side, quantity = %order.quantity, "Order failed: {}", e);
            e
        })?;

        self.states.insert(symbol.to_string(), decision.new_state);
        Ok(AssetOutcome::Executed {
            state: decision.new_state,
            order: response,
            message: decision.message,
        })
    }

    async fn log_quote_balance(&self) {
        match self.gateway.account().await {
            Ok(balances) => info!(
                user_id = self.session.user_id,
                usdt_free = %free_balance(&balances, "USDT"),
                "Pass complete"
            ),
            Err(e) => debug!(user_id = self.session.user_id, "Could not read USDT balance: {}", e),
        }
    }
}
