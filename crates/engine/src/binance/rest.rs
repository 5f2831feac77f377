use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use common::{Balances, Candle, Error, Fill, MarketGateway, Order, PriceSeries, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// REST API client for Binance spot. Serves market data, account balances
/// and market orders.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BinanceClient {
    /// `timeout` bounds every request end to end.
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn sign(&self, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid API secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        Ok(format!("{query}&signature={signature}"))
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = if params.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{params}", self.base_url)
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let query = self.signed_query(params)?;
        let url = format!("{}{path}?{query}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let body = self.signed_query(params)?;
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

#[async_trait]
impl MarketGateway for BinanceClient {
    async fn quote_symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        let body = self.public_get("/api/v3/exchangeInfo", "").await?;
        parse_exchange_info(&body, quote_asset)
    }

    async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<PriceSeries> {
        let params = format!("symbol={symbol}&interval={interval}&limit={limit}");
        let body = self.public_get("/api/v3/klines", &params).await?;
        parse_klines(symbol, &body)
    }

    async fn balances(&self) -> Result<Balances> {
        let body = self.signed_get("/api/v3/account", "").await?;
        parse_account(&body)
    }

    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        let side = order.side.to_string();
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            order.symbol,
            side,
            format_quantity(order.quantity),
            order.id
        );

        debug!(
            symbol = %order.symbol,
            side = %side,
            qty = order.quantity,
            "Submitting order to Binance"
        );
        let body = self.signed_post("/api/v3/order", &params).await?;
        parse_order_response(order, &body)
    }
}

/// Fixed six-decimal rendering without trailing zeros (`0.0100` → `"0.01"`).
pub fn format_quantity(quantity: f64) -> String {
    let s = format!("{quantity:.6}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ─── Response parsing ─────────────────────────────────────────────────────────

/// Symbols quoted in `quote_asset` whose status is `TRADING`, in response order.
pub fn parse_exchange_info(body: &str, quote_asset: &str) -> Result<Vec<String>> {
    let info: ExchangeInfo =
        serde_json::from_str(body).map_err(|e| Error::Exchange(e.to_string()))?;
    Ok(info
        .symbols
        .into_iter()
        .filter(|s| s.quote_asset == quote_asset && s.status == "TRADING")
        .map(|s| s.symbol)
        .collect())
}

/// Kline rows are positional arrays: `[openTime, open, high, low, close, ...]`
/// with prices encoded as strings.
pub fn parse_klines(symbol: &str, body: &str) -> Result<PriceSeries> {
    let rows: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(body).map_err(|e| Error::Exchange(e.to_string()))?;

    let candles = rows
        .iter()
        .map(|row| -> Result<Candle> {
            let field = |idx: usize| -> Result<f64> {
                row.get(idx)
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| {
                        Error::Exchange(format!("malformed kline for {symbol}: field {idx}"))
                    })
            };
            Ok(Candle::new(field(1)?, field(2)?, field(3)?, field(4)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PriceSeries::new(symbol, candles))
}

pub fn parse_account(body: &str) -> Result<Balances> {
    let account: AccountResponse =
        serde_json::from_str(body).map_err(|e| Error::Exchange(e.to_string()))?;
    Ok(Balances::from_free(account.balances.into_iter().map(|b| {
        let free = b.free.parse::<f64>().unwrap_or(0.0);
        (b.asset, free)
    })))
}

fn parse_order_response(order: &Order, body: &str) -> Result<Fill> {
    let resp: OrderResponse =
        serde_json::from_str(body).map_err(|e| Error::Exchange(e.to_string()))?;

    let executed = resp
        .executed_qty
        .as_deref()
        .and_then(|q| q.parse::<f64>().ok())
        .filter(|q| *q > 0.0)
        .unwrap_or(order.quantity);
    let fill_price = resp
        .fills
        .first()
        .and_then(|f| f.price.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(Fill {
        order_id: resp.client_order_id,
        symbol: order.symbol.clone(),
        side: order.side,
        fill_price,
        quantity: executed,
        timestamp: Utc::now(),
    })
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
}
