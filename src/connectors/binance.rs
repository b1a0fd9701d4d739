// src/connectors/binance.rs
use crate::config::BinanceConfig;
use crate::connectors::messages::{
    AccountInfo, ApiError, ExchangeInfo, OrderAck, SymbolFilter, TickerPrice, FALLBACK_MIN_NOTIONAL,
    KLINE_CLOSE_INDEX, KLINE_CLOSE_TIME_INDEX,
};
use crate::connectors::traits::{GatewayFactory, MarketDataGateway};
use crate::error::{BotError, BotResult};
use crate::types::{
    AssetSpec, Balance, Credentials, OrderRequest, OrderResponse, PricePoint, PriceSeries,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

pub struct BinanceClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: String,
    recv_window: u64,
}

impl BinanceClient {
    pub fn new(credentials: &Credentials, config: &BinanceConfig) -> Self {
        Self {
            api_key: credentials.api_key.clone(),
            secret_key: credentials.api_secret.clone(),
            http_client: Client::new(),
            base_rest_url: config.base_url.trim_end_matches('/').to_string(),
            recv_window: config.recv_window,
        }
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> BotResult<String> {
        let mut params = params;
        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query_string = serde_urlencoded::to_string(&params)
            .map_err(|e| BotError::Config(format!("cannot encode query: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| BotError::Config("invalid secret key length".to_string()))?;
        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query_string, signature))
    }

    /// Sends a request and returns the status with the raw body.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: String,
        signed: bool,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let url = format!("{}{}?{}", self.base_rest_url, endpoint, query);
        let mut request = self.http_client.request(method, &url);
        if signed {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// GET for market data; any failure is a transient error on `symbol`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        symbol: &str,
        endpoint: &str,
        params: Vec<(&str, String)>,
        signed: bool,
    ) -> BotResult<T> {
        let query = if signed {
            self.sign_and_build_query(params)?
        } else {
            serde_urlencoded::to_string(&params)
                .map_err(|e| BotError::Config(format!("cannot encode query: {}", e)))?
        };

        let (status, body) = self
            .send(Method::GET, endpoint, query, signed)
            .await
            .map_err(|e| BotError::market_data(symbol, e))?;

        if !status.is_success() {
            return Err(BotError::market_data(symbol, describe_error(status, &body)));
        }
        serde_json::from_str(&body).map_err(|e| BotError::market_data(symbol, e))
    }
}

fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => format!("{} (code {})", err.msg, err.code),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

fn parse_kline_row(symbol: &str, row: &[Value]) -> BotResult<PricePoint> {
    let close = row
        .get(KLINE_CLOSE_INDEX)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| BotError::market_data(symbol, "kline row without a close price"))?;
    let close_time = row
        .get(KLINE_CLOSE_TIME_INDEX)
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| BotError::market_data(symbol, "kline row without a close time"))?;

    Ok(PricePoint { close, close_time })
}

#[async_trait]
impl MarketDataGateway for BinanceClient {
    async fn ticker_price(&self, symbol: &str) -> BotResult<Decimal> {
        let ticker: TickerPrice = self
            .get_json(symbol, "/api/v3/ticker/price", vec![("symbol", symbol.to_string())], false)
            .await?;
        Ok(ticker.price)
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: u16) -> BotResult<PriceSeries> {
        let rows: Vec<Vec<Value>> = self
            .get_json(
                symbol,
                "/api/v3/klines",
                vec![
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
                false,
            )
            .await?;

        let points = rows
            .iter()
            .map(|row| parse_kline_row(symbol, row))
            .collect::<BotResult<Vec<_>>>()?;
        debug!(symbol, candles = points.len(), "Fetched klines");
        Ok(PriceSeries::new(points))
    }

    async fn symbol_info(&self, symbol: &str) -> BotResult<AssetSpec> {
        let info: ExchangeInfo = self
            .get_json(symbol, "/api/v3/exchangeInfo", vec![("symbol", symbol.to_string())], false)
            .await?;

        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BotError::market_data(symbol, "symbol not listed"))?;

        let mut lot = None;
        let mut min_notional = None;
        for filter in entry.filters {
            match filter {
                SymbolFilter::LotSize {
                    min_qty,
                    max_qty,
                    step_size,
                } => lot = Some((min_qty, max_qty, step_size)),
                SymbolFilter::MinNotional { min_notional: v }
                | SymbolFilter::Notional { min_notional: v } => min_notional = Some(v),
                SymbolFilter::Other => {}
            }
        }

        let (min_qty, max_qty, step_size) =
            lot.ok_or_else(|| BotError::market_data(symbol, "LOT_SIZE filter missing"))?;
        let min_notional = min_notional.unwrap_or(FALLBACK_MIN_NOTIONAL);

        Ok(AssetSpec {
            symbol: entry.symbol,
            base_asset: entry.base_asset,
            quote_asset: entry.quote_asset,
            min_qty,
            max_qty,
            step_size,
            min_notional,
        })
    }

    async fn account(&self) -> BotResult<Vec<Balance>> {
        let info: AccountInfo = self.get_json("ACCOUNT", "/api/v3/account", vec![], true).await?;
        Ok(info
            .balances
            .into_iter()
            .map(|b| Balance {
                asset: b.asset,
                free: b.free,
                locked: b.locked,
            })
            .collect())
    }

    async fn create_order(&self, order: &OrderRequest) -> BotResult<OrderResponse> {
        let params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", order.quantity_str()),
        ];

        info!(
            "🚀 Sending Order: {} {} {} (MARKET)",
            order.side,
            order.quantity_str(),
            order.symbol
        );

        let query = self.sign_and_build_query(params)?;
        let (status, body) = self
            .send(Method::POST, "/api/v3/order", query, true)
            .await
            .map_err(|e| BotError::rejected(&order.symbol, e))?;

        if !status.is_success() {
            return Err(BotError::rejected(&order.symbol, describe_error(status, &body)));
        }

        let ack: OrderAck =
            serde_json::from_str(&body).map_err(|e| BotError::rejected(&order.symbol, e))?;
        Ok(OrderResponse {
            id: ack.order_id.to_string(),
            symbol: ack.symbol,
            status: ack.status,
        })
    }
}

/// Connects each user to Binance with their own keys.
pub struct BinanceConnector {
    config: BinanceConfig,
}

impl BinanceConnector {
    pub fn new(config: BinanceConfig) -> Self {
        Self { config }
    }
}

impl GatewayFactory for BinanceConnector {
    fn connect(&self, credentials: &Credentials) -> BotResult<Arc<dyn MarketDataGateway>> {
        Ok(Arc::new(BinanceClient::new(credentials, &self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn client() -> BinanceClient {
        BinanceClient::new(
            &Credentials {
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            &BinanceConfig::default(),
        )
    }

    #[test]
    fn test_signed_query_layout() {
        let query = client()
            .sign_and_build_query(vec![("symbol", "BTCUSDT".to_string())])
            .unwrap();

        assert!(query.starts_with("symbol=BTCUSDT&recvWindow=60000&timestamp="));
        let signature = query.rsplit("signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_kline_row() {
        let row = json!([
            1499040000000i64,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1499644799999i64,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "0"
        ]);
        let point = parse_kline_row("BNBBTC", row.as_array().unwrap()).unwrap();
        assert_eq!(point.close, dec!(0.015771));
        assert_eq!(point.close_time.timestamp_millis(), 1499644799999);
    }

    #[test]
    fn test_describe_error_prefers_exchange_message() {
        let msg = describe_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":-1013,"msg":"Filter failure: NOTIONAL"}"#,
        );
        assert_eq!(msg, "Filter failure: NOTIONAL (code -1013)");

        let raw = describe_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(raw.contains("502"));
    }
}
