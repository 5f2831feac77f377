use std::sync::Arc;

use tracing::{info, warn};

use common::{base_asset, MarketGateway, OrderOutcome, Result, QUANTITY_DECIMALS};

/// Round half away from zero to `QUANTITY_DECIMALS` places.
pub fn round_quantity(quantity: f64) -> f64 {
    let factor = 10f64.powi(QUANTITY_DECIMALS);
    (quantity * factor).round() / factor
}

/// Turns sell/buy intents into market orders and reports each attempt as an
/// `OrderOutcome`. Gateway failures never escape: they become `Failed`.
///
/// This is the ONLY component that places orders on the gateway.
pub struct OrderExecutor {
    gateway: Arc<dyn MarketGateway>,
    quote_asset: String,
    price_interval: String,
}

impl OrderExecutor {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        quote_asset: impl Into<String>,
        price_interval: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            quote_asset: quote_asset.into(),
            price_interval: price_interval.into(),
        }
    }

    /// Close of the most recent candle of `symbol`.
    pub async fn last_price(&self, symbol: &str) -> Result<f64> {
        let series = self.gateway.candles(symbol, &self.price_interval, 1).await?;
        series
            .last_close()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| common::Error::Exchange(format!("no price available for {symbol}")))
    }

    /// Sell `amount` of the base asset of `symbol` at market.
    ///
    /// Proceeds are valued at the last candle close, not the fill price.
    pub async fn sell(&self, symbol: &str, amount: f64) -> OrderOutcome {
        let price = match self.last_price(symbol).await {
            Ok(p) => p,
            Err(e) => return self.failed(symbol, "sell", e.to_string()),
        };
        let quantity = round_quantity(amount);
        if quantity <= 0.0 {
            return self.failed(symbol, "sell", format!("quantity {amount} rounds to zero"));
        }

        match self.gateway.market_sell(symbol, quantity).await {
            Ok(fill) => {
                let proceeds = quantity * price;
                info!(
                    symbol = %symbol,
                    qty = quantity,
                    price,
                    proceeds,
                    order_id = %fill.order_id,
                    "Sold to {}", self.quote_asset
                );
                OrderOutcome::Filled { quantity, proceeds }
            }
            Err(e) => self.failed(symbol, "sell", e.to_string()),
        }
    }

    /// Spend `quote_amount` on `symbol` at market. Proceeds are the base-asset
    /// quantity reported by the fill.
    pub async fn buy(&self, symbol: &str, quote_amount: f64) -> OrderOutcome {
        let price = match self.last_price(symbol).await {
            Ok(p) => p,
            Err(e) => return self.failed(symbol, "buy", e.to_string()),
        };
        let quantity = round_quantity(quote_amount / price);
        if quantity <= 0.0 {
            return self.failed(
                symbol,
                "buy",
                format!("{quote_amount} {} buys nothing at {price}", self.quote_asset),
            );
        }

        match self.gateway.market_buy(symbol, quantity).await {
            Ok(fill) => {
                info!(
                    symbol = %symbol,
                    qty = fill.quantity,
                    base = base_asset(symbol, &self.quote_asset).unwrap_or(symbol),
                    spent = quote_amount,
                    order_id = %fill.order_id,
                    "Bought with {}", self.quote_asset
                );
                OrderOutcome::Filled {
                    quantity: fill.quantity,
                    proceeds: fill.quantity,
                }
            }
            Err(e) => self.failed(symbol, "buy", e.to_string()),
        }
    }

    fn failed(&self, symbol: &str, side: &str, reason: String) -> OrderOutcome {
        warn!(symbol = %symbol, side, error = %reason, "Order failed");
        OrderOutcome::Failed { reason }
    }
}
