// src/connectors/messages.rs
//! Binance spot REST payloads.
use rust_decimal::Decimal;
use serde::Deserialize;

/// Used when a symbol lists neither MIN_NOTIONAL nor NOTIONAL: 5.5 USDT.
pub const FALLBACK_MIN_NOTIONAL: Decimal = Decimal::from_parts(55, 0, 0, false, 1);

/// GET /api/v3/ticker/price
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}

/// GET /api/v3/exchangeInfo?symbol=...
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        min_qty: Decimal,
        max_qty: Decimal,
        step_size: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { min_notional: Decimal },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional { min_notional: Decimal },
    #[serde(other)]
    Other,
}

/// GET /api/v3/account
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// POST /api/v3/order
#[derive(Debug, Deserialize)]
pub struct OrderAck {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    pub symbol: String,
    pub status: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

/// Kline rows are positional arrays: [open_time, open, high, low, close,
/// volume, close_time, ...].
pub const KLINE_CLOSE_INDEX: usize = 4;
pub const KLINE_CLOSE_TIME_INDEX: usize = 6;
