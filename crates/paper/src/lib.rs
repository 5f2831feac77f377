use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    base_asset, Balances, Error, Fill, MarketGateway, Order, OrderSide, PriceSeries, Result,
    QUANTITY_DECIMALS,
};

/// Simulated account for paper trading.
///
/// Market data (symbol universe, candles) comes from the wrapped gateway;
/// balances and fills are kept in memory. Fills happen at the latest candle
/// close with configurable slippage. No order ever reaches the exchange.
pub struct PaperGateway {
    market: Arc<dyn MarketGateway>,
    quote_asset: String,
    /// Interval of the candle used as the fill reference price.
    price_interval: String,
    /// Free balances in insertion order.
    balances: Arc<RwLock<Vec<(String, f64)>>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

impl PaperGateway {
    pub fn new(
        market: Arc<dyn MarketGateway>,
        quote_asset: impl Into<String>,
        initial_quote: f64,
        slippage_bps: f64,
    ) -> Self {
        let quote_asset = quote_asset.into();
        info!(
            balance = initial_quote,
            quote = %quote_asset,
            slippage_bps = slippage_bps,
            "PaperGateway initialized"
        );
        Self {
            market,
            balances: Arc::new(RwLock::new(vec![(quote_asset.clone(), initial_quote)])),
            quote_asset,
            price_interval: "1m".to_string(),
            slippage_bps,
        }
    }

    /// Use candles of `interval` as the fill reference price.
    pub fn with_price_interval(mut self, interval: impl Into<String>) -> Self {
        self.price_interval = interval.into();
        self
    }

    /// Seed or overwrite a simulated holding.
    pub async fn set_balance(&self, asset: &str, free: f64) {
        let mut balances = self.balances.write().await;
        match balances.iter_mut().find(|(a, _)| a == asset) {
            Some(entry) => entry.1 = free,
            None => balances.push((asset.to_string(), free)),
        }
    }

    async fn reference_price(&self, symbol: &str) -> Result<f64> {
        let series = self.market.candles(symbol, &self.price_interval, 1).await?;
        series.last_close().filter(|p| *p > 0.0).ok_or_else(|| {
            Error::Exchange(format!("PaperGateway has no price for '{symbol}'"))
        })
    }
}

/// Truncate to `QUANTITY_DECIMALS` places, so a held quantity always
/// survives the executor's rounding when it is sold back.
fn floor_quantity(quantity: f64) -> f64 {
    let factor = 10f64.powi(QUANTITY_DECIMALS);
    (quantity * factor).floor() / factor
}

fn free_of(balances: &[(String, f64)], asset: &str) -> f64 {
    balances
        .iter()
        .find(|(a, _)| a == asset)
        .map(|(_, free)| *free)
        .unwrap_or(0.0)
}

fn adjust(balances: &mut Vec<(String, f64)>, asset: &str, delta: f64) {
    match balances.iter_mut().find(|(a, _)| a == asset) {
        Some(entry) => entry.1 = (entry.1 + delta).max(0.0),
        None => balances.push((asset.to_string(), delta.max(0.0))),
    }
}

#[async_trait]
impl MarketGateway for PaperGateway {
    async fn quote_symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        self.market.quote_symbols(quote_asset).await
    }

    async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<PriceSeries> {
        self.market.candles(symbol, interval, limit).await
    }

    async fn balances(&self) -> Result<Balances> {
        Ok(Balances::from_free(self.balances.read().await.clone()))
    }

    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        let base = base_asset(&order.symbol, &self.quote_asset).ok_or_else(|| {
            Error::OrderRejected(format!(
                "{} is not quoted in {}",
                order.symbol, self.quote_asset
            ))
        })?;
        let mid_price = self.reference_price(&order.symbol).await?;

        // Apply slippage: buys pay more, sells receive less
        let fill_price = match order.side {
            OrderSide::Buy => mid_price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid_price * (1.0 - self.slippage_bps / 10_000.0),
        };

        let mut balances = self.balances.write().await;
        let quantity = match order.side {
            OrderSide::Sell => {
                let held = free_of(&balances, base);
                if order.quantity > held {
                    return Err(Error::OrderRejected(format!(
                        "insufficient {base} balance: have {held}, need {}",
                        order.quantity
                    )));
                }
                adjust(&mut balances, base, -order.quantity);
                adjust(&mut balances, &self.quote_asset, order.quantity * fill_price);
                order.quantity
            }
            OrderSide::Buy => {
                let available = free_of(&balances, &self.quote_asset);
                // Scale down to what the simulated quote balance affords.
                let quantity = floor_quantity(order.quantity.min(available / fill_price));
                if quantity <= 0.0 {
                    return Err(Error::OrderRejected(format!(
                        "insufficient {} balance",
                        self.quote_asset
                    )));
                }
                adjust(&mut balances, &self.quote_asset, -(quantity * fill_price));
                adjust(&mut balances, base, quantity);
                quantity
            }
        };

        debug!(
            symbol = %order.symbol,
            side = ?order.side,
            mid = mid_price,
            fill = fill_price,
            qty = quantity,
            "Paper fill simulated"
        );

        Ok(Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            fill_price,
            quantity,
            timestamp: Utc::now(),
        })
    }
}
