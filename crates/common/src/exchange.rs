use async_trait::async_trait;

use crate::{Balances, Fill, Order, OrderSide, PriceSeries, Result};

/// Abstraction over the exchange connection: market data plus the account.
///
/// `BinanceClient` implements this for live trading.
/// `PaperGateway` implements this for simulation.
///
/// Every call may fail with a generic exchange error; callers decide which
/// failures are recoverable.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Actively trading symbols quoted in `quote_asset`, in exchange order.
    async fn quote_symbols(&self, quote_asset: &str) -> Result<Vec<String>>;

    /// The latest `limit` candles of `symbol` at `interval` (e.g. "1h"), oldest first.
    async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<PriceSeries>;

    /// Free balances of every asset with a positive amount.
    async fn balances(&self) -> Result<Balances>;

    /// Submit an order and return the fill confirmation.
    async fn submit_order(&self, order: &Order) -> Result<Fill>;

    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<Fill> {
        self.submit_order(&Order::market(symbol, OrderSide::Sell, quantity))
            .await
    }

    async fn market_buy(&self, symbol: &str, quantity: f64) -> Result<Fill> {
        self.submit_order(&Order::market(symbol, OrderSide::Buy, quantity))
            .await
    }
}
