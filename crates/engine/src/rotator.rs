use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    base_asset, describe_signals, Balances, Config, ConversionRecord, CyclePhase, MarketGateway,
    OrderOutcome, PatternSignal, Result,
};
use journal::ConversionJournal;
use strategy::PatternDetector;

use crate::clock::Clock;
use crate::executor::OrderExecutor;
use crate::retry::with_backoff;

/// Reason logged for every holding sold into `quote_asset`.
pub fn liquidation_reason(quote_asset: &str) -> String {
    format!("Conversión a {quote_asset} para rotación")
}

/// Tunables of one rotation cycle.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub quote_asset: String,
    pub candle_interval: String,
    pub candle_limit: usize,
    /// Acquisition is skipped unless the quote total is strictly above this.
    pub dust_threshold: f64,
    /// Candle fetches in flight while scanning. 1 = strictly sequential.
    pub scan_concurrency: usize,
    /// Attempts for the symbol-universe and balance fetches.
    pub fetch_retries: u32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            candle_interval: "1h".to_string(),
            candle_limit: 100,
            dust_threshold: 0.0001,
            scan_concurrency: 1,
            fetch_retries: 3,
        }
    }
}

impl RotationSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            quote_asset: cfg.quote_asset.clone(),
            candle_interval: cfg.candle_interval.clone(),
            candle_limit: cfg.candle_limit,
            dust_threshold: cfg.dust_threshold,
            scan_concurrency: cfg.scan_concurrency,
            fetch_retries: cfg.fetch_retries,
        }
    }
}

/// The symbol chosen by a scan and the signals that chose it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub symbol: String,
    pub base_asset: String,
    pub signals: Vec<PatternSignal>,
}

/// Everything a finished cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub target: Option<Selection>,
    /// Quote balance after liquidation: the pre-existing quote balance plus
    /// the valued proceeds of every successful sell.
    pub quote_after_liquidation: f64,
    /// One record per sell or buy attempt, in execution order.
    pub conversions: Vec<ConversionRecord>,
    /// `None` when acquisition was skipped.
    pub acquisition: Option<OrderOutcome>,
}

/// State threaded through the steps of a single cycle.
struct CycleContext {
    universe: Vec<String>,
    target: Option<Selection>,
    quote_total: f64,
    conversions: Vec<ConversionRecord>,
    acquisition: Option<OrderOutcome>,
}

impl CycleContext {
    fn new(universe: Vec<String>, target: Option<Selection>) -> Self {
        Self {
            universe,
            target,
            quote_total: 0.0,
            conversions: Vec::new(),
            acquisition: None,
        }
    }

    fn into_report(self) -> CycleReport {
        CycleReport {
            target: self.target,
            quote_after_liquidation: self.quote_total,
            conversions: self.conversions,
            acquisition: self.acquisition,
        }
    }
}

/// Scan → liquidate → acquire, once per call to `run_cycle`.
///
/// Scanning uses a first-match policy: the first symbol in universe order
/// with at least one signal wins, never the "best" one. With concurrent
/// fetching enabled the results are still consumed in universe order.
pub struct Rotator {
    gateway: Arc<dyn MarketGateway>,
    detector: PatternDetector,
    executor: OrderExecutor,
    journal: ConversionJournal,
    clock: Arc<dyn Clock>,
    settings: RotationSettings,
    phase: Arc<RwLock<CyclePhase>>,
}

impl Rotator {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        detector: PatternDetector,
        journal: ConversionJournal,
        clock: Arc<dyn Clock>,
        settings: RotationSettings,
    ) -> Self {
        let executor = OrderExecutor::new(
            gateway.clone(),
            settings.quote_asset.clone(),
            settings.candle_interval.clone(),
        );
        Self {
            gateway,
            detector,
            executor,
            journal,
            clock,
            settings,
            phase: Arc::new(RwLock::new(CyclePhase::Stopped)),
        }
    }

    /// Shared view of the current phase.
    pub fn phase_handle(&self) -> Arc<RwLock<CyclePhase>> {
        self.phase.clone()
    }

    pub fn settings(&self) -> &RotationSettings {
        &self.settings
    }

    /// Run one full cycle.
    ///
    /// Only a failure to fetch the symbol universe or the balances (after
    /// retries) is returned as an error; every per-symbol and per-order
    /// failure is absorbed into the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.set_phase(CyclePhase::Scanning).await;
        info!(at = %self.clock.now(), "Scanning market");

        let quote = self.settings.quote_asset.as_str();
        let universe = with_backoff(
            self.clock.as_ref(),
            self.settings.fetch_retries,
            "symbol universe",
            || self.gateway.quote_symbols(quote),
        )
        .await?;
        info!(count = universe.len(), quote, "Fetched symbol universe");

        let target = self.scan(&universe).await;
        let mut ctx = CycleContext::new(universe, target);

        self.set_phase(CyclePhase::Liquidating).await;
        self.liquidate(&mut ctx).await?;

        self.set_phase(CyclePhase::Acquiring).await;
        self.acquire(&mut ctx).await;

        Ok(ctx.into_report())
    }

    /// First symbol, in universe order, with at least one signal.
    pub async fn scan(&self, universe: &[String]) -> Option<Selection> {
        let mut evaluations = stream::iter(universe)
            .map(|symbol| self.evaluate(symbol))
            .buffered(self.settings.scan_concurrency.max(1))
            .boxed();

        while let Some(found) = evaluations.next().await {
            if let Some(selection) = found {
                info!(
                    symbol = %selection.symbol,
                    signals = %describe_signals(&selection.signals),
                    "Pattern detected"
                );
                return Some(selection);
            }
        }
        info!("No symbol matched any pattern");
        None
    }

    /// Detection for one symbol; any failure counts as "no match".
    async fn evaluate(&self, symbol: &str) -> Option<Selection> {
        let series = match self
            .gateway
            .candles(symbol, &self.settings.candle_interval, self.settings.candle_limit)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Skipping symbol: candle fetch failed");
                return None;
            }
        };

        match self.detector.detect(&series) {
            Ok(signals) if !signals.is_empty() => Some(Selection {
                symbol: symbol.to_string(),
                base_asset: base_asset(symbol, &self.settings.quote_asset)
                    .unwrap_or(symbol)
                    .to_string(),
                signals,
            }),
            Ok(_) => None,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Skipping symbol: detection failed");
                None
            }
        }
    }

    /// Sell every non-quote holding. The quote total starts at the existing
    /// quote balance and grows by the valued proceeds of each successful sell.
    async fn liquidate(&self, ctx: &mut CycleContext) -> Result<()> {
        let quote = self.settings.quote_asset.clone();
        let balances: Balances = with_backoff(
            self.clock.as_ref(),
            self.settings.fetch_retries,
            "balances",
            || self.gateway.balances(),
        )
        .await?;
        info!(balances = %balances, "Account balances");

        let tradable: HashSet<&str> = ctx.universe.iter().map(String::as_str).collect();
        let reason = liquidation_reason(&quote);
        ctx.quote_total = balances.get(&quote);

        for holding in balances.iter().filter(|h| h.asset != quote) {
            let symbol = format!("{}{}", holding.asset, quote);
            let outcome = if tradable.contains(symbol.as_str()) {
                self.executor.sell(&symbol, holding.free).await
            } else {
                warn!(asset = %holding.asset, "No active {symbol} market, holding left as is");
                OrderOutcome::Failed {
                    reason: format!("no active {symbol} market"),
                }
            };

            let proceeds = outcome.proceeds();
            let record = self
                .journal
                .record(
                    self.clock.now(),
                    &holding.asset,
                    holding.free,
                    &quote,
                    proceeds,
                    &reason,
                )
                .await;
            ctx.conversions.push(record);
            ctx.quote_total += proceeds;
        }

        info!(total = ctx.quote_total, quote = %quote, "Liquidation finished");
        Ok(())
    }

    /// All-in buy of the cycle target, unless there is no target or the
    /// quote total is dust.
    async fn acquire(&self, ctx: &mut CycleContext) {
        let quote = self.settings.quote_asset.as_str();
        let Some(target) = ctx.target.as_ref() else {
            info!(total = ctx.quote_total, quote, "No pattern detected, capital stays in {quote}");
            return;
        };
        if ctx.quote_total <= self.settings.dust_threshold {
            info!(
                total = ctx.quote_total,
                threshold = self.settings.dust_threshold,
                symbol = %target.symbol,
                "Insufficient {quote} balance, skipping purchase"
            );
            return;
        }

        let outcome = self.executor.buy(&target.symbol, ctx.quote_total).await;
        let record = self
            .journal
            .record(
                self.clock.now(),
                quote,
                ctx.quote_total,
                &target.base_asset,
                outcome.proceeds(),
                &describe_signals(&target.signals),
            )
            .await;
        ctx.conversions.push(record);
        ctx.acquisition = Some(outcome);
    }

    async fn set_phase(&self, phase: CyclePhase) {
        *self.phase.write().await = phase;
    }
}
