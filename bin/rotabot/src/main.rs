use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketGateway, TradingMode};
use engine::{BinanceClient, Clock, Engine, RotationSettings, Rotator, SystemClock};
use journal::ConversionJournal;
use paper::PaperGateway;
use strategy::{DetectorConfig, PatternDetector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(mode = %cfg.trading_mode, quote = %cfg.quote_asset, "RotaBot starting");

    let detector_cfg = match cfg.detector_config_path.as_deref() {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("loading detector config from {path}"))?,
        None => DetectorConfig::default(),
    };
    info!(?detector_cfg, "Pattern detector configured");

    // ── Exchange gateway (injected based on TRADING_MODE) ─────────────────────
    let binance: Arc<dyn MarketGateway> = Arc::new(BinanceClient::new(
        &cfg.binance_api_key,
        &cfg.binance_secret,
        &cfg.binance_base_url,
        cfg.http_timeout,
    )?);
    let gateway: Arc<dyn MarketGateway> = match cfg.trading_mode {
        TradingMode::Live => {
            warn!("Live trading mode: real market orders will be placed");
            binance
        }
        TradingMode::Paper => {
            info!(
                balance = cfg.paper_initial_quote,
                slippage_bps = cfg.paper_slippage_bps,
                "Paper trading mode, using PaperGateway"
            );
            Arc::new(
                PaperGateway::new(
                    binance,
                    cfg.quote_asset.clone(),
                    cfg.paper_initial_quote,
                    cfg.paper_slippage_bps,
                )
                .with_price_interval(cfg.candle_interval.clone()),
            )
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let journal = ConversionJournal::new(&cfg.conversion_log_path);
    info!(path = %journal.path().display(), "Conversion log");

    let rotator = Rotator::new(
        gateway,
        PatternDetector::new(detector_cfg),
        journal,
        clock.clone(),
        RotationSettings::from_config(&cfg),
    );
    let (engine, handle) = Engine::new(rotator, clock, cfg.cycle_interval);
    let mut task = tokio::spawn(engine.run());

    // ── Shutdown ──────────────────────────────────────────────────────────────
    let outcome = tokio::select! {
        joined = &mut task => joined,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("Shutdown signal received. Finishing current cycle.");
            handle.shutdown();
            task.await
        }
    };

    outcome.context("engine task panicked")??;
    info!(cycles = handle.cycles(), "RotaBot stopped");
    Ok(())
}
