#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use common::{Balances, Candle, Error, Fill, MarketGateway, Order, PriceSeries, Result};
use engine::{ManualClock, RotationSettings, Rotator};
use journal::ConversionJournal;
use strategy::PatternDetector;

/// In-memory exchange with scripted market data and failures.
#[derive(Default)]
pub struct ScriptedGateway {
    pub universe: Vec<String>,
    /// Number of leading `quote_symbols` calls that fail; `u32::MAX` = always.
    pub universe_failures: AtomicU32,
    pub candles: HashMap<String, Vec<Candle>>,
    pub candle_delays: HashMap<String, Duration>,
    pub balances: Vec<(String, f64)>,
    pub failing_orders: HashSet<String>,
    pub orders: Mutex<Vec<Order>>,
    pub scanned: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.universe.push(symbol.to_string());
        self.candles.insert(symbol.to_string(), candles);
        self
    }

    /// Listed in the universe but serving no candles.
    pub fn with_broken_symbol(mut self, symbol: &str) -> Self {
        self.universe.push(symbol.to_string());
        self
    }

    pub fn with_balance(mut self, asset: &str, free: f64) -> Self {
        self.balances.push((asset.to_string(), free));
        self
    }

    pub fn failing_order(mut self, symbol: &str) -> Self {
        self.failing_orders.insert(symbol.to_string());
        self
    }

    pub fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
        self.candle_delays.insert(symbol.to_string(), delay);
        self
    }

    pub fn failing_universe(self, times: u32) -> Self {
        self.universe_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn scanned(&self) -> Vec<String> {
        self.scanned.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketGateway for ScriptedGateway {
    async fn quote_symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        let remaining = self.universe_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.universe_failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(Error::Exchange("HTTP 503: exchangeInfo unavailable".into()));
        }
        Ok(self
            .universe
            .iter()
            .filter(|s| s.ends_with(quote_asset))
            .cloned()
            .collect())
    }

    async fn candles(&self, symbol: &str, _interval: &str, limit: usize) -> Result<PriceSeries> {
        if limit > 1 {
            self.scanned.lock().unwrap().push(symbol.to_string());
        }
        if let Some(delay) = self.candle_delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        let candles = self
            .candles
            .get(symbol)
            .ok_or_else(|| Error::Exchange(format!("Invalid symbol {symbol}")))?;
        let start = candles.len().saturating_sub(limit);
        Ok(PriceSeries::new(symbol, candles[start..].to_vec()))
    }

    async fn balances(&self) -> Result<Balances> {
        Ok(Balances::from_free(self.balances.clone()))
    }

    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        self.orders.lock().unwrap().push(order.clone());
        if self.failing_orders.contains(&order.symbol) {
            return Err(Error::Exchange(
                r#"HTTP 400 Bad Request: {"code":-2010,"msg":"Account has insufficient balance"}"#
                    .into(),
            ));
        }
        let price = self
            .candles
            .get(&order.symbol)
            .and_then(|c| c.last())
            .map(|c| c.close)
            .unwrap_or(0.0);
        Ok(Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            fill_price: price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }
}

/// Steadily rising closes ending exactly at `price`: SMA(5) > SMA(20),
/// RSI 100, no hammer. Detects as a single "bullish MA cross".
pub fn rising_candles(price: f64) -> Vec<Candle> {
    let step = price * 0.001;
    (0..30)
        .map(|i| {
            let close = price - (29 - i) as f64 * step;
            Candle::new(close - step, close, close - step, close)
        })
        .collect()
}

/// Perfectly flat market at `price`: no rule fires.
pub fn flat_candles(price: f64) -> Vec<Candle> {
    vec![Candle::new(price, price, price, price); 30]
}

pub fn temp_log() -> PathBuf {
    std::env::temp_dir().join(format!("rotation-{}.txt", uuid::Uuid::new_v4()))
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ))
}

pub fn rotator(
    gateway: Arc<ScriptedGateway>,
    clock: Arc<ManualClock>,
    log: &PathBuf,
    settings: RotationSettings,
) -> Rotator {
    Rotator::new(
        gateway,
        PatternDetector::default(),
        ConversionJournal::new(log),
        clock,
        settings,
    )
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
