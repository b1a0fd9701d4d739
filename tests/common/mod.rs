//! In-memory exchange used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use trend_sniper::connectors::traits::{GatewayFactory, MarketDataGateway};
use trend_sniper::error::{BotError, BotResult};
use trend_sniper::types::{
    AssetSpec, Balance, Credentials, OrderRequest, OrderResponse, PriceSeries, Side,
};

#[derive(Default)]
struct MockState {
    prices: HashMap<String, Decimal>,
    klines: HashMap<String, PriceSeries>,
    specs: HashMap<String, AssetSpec>,
    balances: HashMap<String, Decimal>,
    orders: Vec<OrderRequest>,
    account_calls: usize,
    failing: HashSet<String>,
    panic_on: HashSet<String>,
    reject_orders: bool,
    price_delay: Option<Duration>,
    stop_on: Option<(String, watch::Sender<bool>)>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Lists `symbol` (base asset + "USDT") with a 0.001 step and a 5 USDT
    /// minimum notional.
    pub fn list(&self, symbol: &str, price: Decimal) {
        let base = symbol.trim_end_matches("USDT").to_string();
        let mut state = self.state();
        state.specs.insert(
            symbol.to_string(),
            AssetSpec {
                symbol: symbol.to_string(),
                base_asset: base,
                quote_asset: "USDT".to_string(),
                min_qty: dec!(0.001),
                max_qty: dec!(9000),
                step_size: dec!(0.001),
                min_notional: dec!(5),
            },
        );
        state.prices.insert(symbol.to_string(), price);
    }

    pub fn set_closes(&self, symbol: &str, closes: &[Decimal]) {
        self.state()
            .klines
            .insert(symbol.to_string(), PriceSeries::from_closes(closes));
    }

    pub fn set_balance(&self, asset: &str, free: Decimal) {
        self.state().balances.insert(asset.to_string(), free);
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        self.state().balances.get(asset).copied().unwrap_or_default()
    }

    pub fn fail_symbol(&self, symbol: &str) {
        self.state().failing.insert(symbol.to_string());
    }

    pub fn panic_on(&self, symbol: &str) {
        self.state().panic_on.insert(symbol.to_string());
    }

    pub fn reject_orders(&self, reject: bool) {
        self.state().reject_orders = reject;
    }

    pub fn slow_prices(&self, delay: Duration) {
        self.state().price_delay = Some(delay);
    }

    /// Raises the stop flag as soon as `symbol` starts being processed.
    pub fn stop_when(&self, symbol: &str, stop: watch::Sender<bool>) {
        self.state().stop_on = Some((symbol.to_string(), stop));
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.state().orders.clone()
    }

    pub fn account_calls(&self) -> usize {
        self.state().account_calls
    }
}

#[async_trait]
impl MarketDataGateway for MockGateway {
    async fn ticker_price(&self, symbol: &str) -> BotResult<Decimal> {
        let delay = self.state().price_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BotError::market_data(symbol, "no ticker"))
    }

    async fn klines(&self, symbol: &str, _interval: &str, _limit: u16) -> BotResult<PriceSeries> {
        self.state()
            .klines
            .get(symbol)
            .cloned()
            .ok_or_else(|| BotError::market_data(symbol, "no klines"))
    }

    async fn symbol_info(&self, symbol: &str) -> BotResult<AssetSpec> {
        let state = self.state();
        if let Some((target, stop)) = &state.stop_on {
            if target == symbol {
                let _ = stop.send(true);
            }
        }
        if state.panic_on.contains(symbol) {
            drop(state);
            panic!("exchange exploded on {}", symbol);
        }
        if state.failing.contains(symbol) {
            return Err(BotError::market_data(symbol, "connection reset"));
        }
        state
            .specs
            .get(symbol)
            .cloned()
            .ok_or_else(|| BotError::market_data(symbol, "symbol not listed"))
    }

    async fn account(&self) -> BotResult<Vec<Balance>> {
        let mut state = self.state();
        state.account_calls += 1;
        Ok(state
            .balances
            .iter()
            .map(|(asset, free)| Balance {
                asset: asset.clone(),
                free: *free,
                locked: Decimal::ZERO,
            })
            .collect())
    }

    async fn create_order(&self, order: &OrderRequest) -> BotResult<OrderResponse> {
        let mut state = self.state();
        if state.reject_orders {
            return Err(BotError::rejected(&order.symbol, "Account has insufficient balance."));
        }

        let base = state
            .specs
            .get(&order.symbol)
            .map(|s| s.base_asset.clone())
            .ok_or_else(|| BotError::rejected(&order.symbol, "unknown symbol"))?;
        let held = state.balances.entry(base).or_default();
        match order.side {
            Side::Buy => *held += order.quantity,
            Side::Sell => *held -= order.quantity,
        }

        state.orders.push(order.clone());
        Ok(OrderResponse {
            id: state.orders.len().to_string(),
            symbol: order.symbol.clone(),
            status: "FILLED".to_string(),
        })
    }
}

/// Hands out the same mock gateway to every user.
pub struct MockFactory {
    pub gateway: Arc<MockGateway>,
    connects: AtomicUsize,
}

impl MockFactory {
    pub fn new(gateway: Arc<MockGateway>) -> Self {
        Self {
            gateway,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl GatewayFactory for MockFactory {
    fn connect(&self, _credentials: &Credentials) -> BotResult<Arc<dyn MarketDataGateway>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.gateway.clone())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
    }
}

pub fn rising(count: i64) -> Vec<Decimal> {
    (1..=count).map(Decimal::from).collect()
}

pub fn falling(count: i64) -> Vec<Decimal> {
    (1..=count).rev().map(Decimal::from).collect()
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
