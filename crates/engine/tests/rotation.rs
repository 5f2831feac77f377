mod support;

use std::sync::Arc;
use std::time::Duration;

use common::{ConversionOutcome, CyclePhase, OrderOutcome, OrderSide};
use engine::{liquidation_reason, RotationSettings};

use support::{
    approx, flat_candles, manual_clock, rising_candles, rotator, temp_log, ScriptedGateway,
};

#[tokio::test]
async fn liquidates_into_usdt_then_buys_the_target() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("BTCUSDT", flat_candles(50_000.0))
            .with_symbol("ETHUSDT", rising_candles(2_000.0))
            .with_balance("BTC", 0.01)
            .with_balance("USDT", 5.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    let target = report.target.as_ref().expect("ETHUSDT should match");
    assert_eq!(target.symbol, "ETHUSDT");
    assert_eq!(target.base_asset, "ETH");
    assert!(approx(report.quote_after_liquidation, 505.0));

    let orders = gateway.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!((orders[0].symbol.as_str(), orders[0].side), ("BTCUSDT", OrderSide::Sell));
    assert_eq!(orders[0].quantity, 0.01);
    assert_eq!((orders[1].symbol.as_str(), orders[1].side), ("ETHUSDT", OrderSide::Buy));
    assert_eq!(orders[1].quantity, 0.2525);

    assert_eq!(report.conversions.len(), 2);
    let sold = &report.conversions[0];
    assert_eq!((sold.source_asset.as_str(), sold.dest_asset.as_str()), ("BTC", "USDT"));
    assert!(approx(sold.dest_amount, 500.0));
    assert_eq!(sold.outcome, ConversionOutcome::Gain);
    assert_eq!(sold.reason, "Conversión a USDT para rotación");
    assert_eq!(sold.reason, liquidation_reason("USDT"));

    let bought = &report.conversions[1];
    assert_eq!((bought.source_asset.as_str(), bought.dest_asset.as_str()), ("USDT", "ETH"));
    assert!(approx(bought.source_amount, 505.0));
    assert_eq!(bought.dest_amount, 0.2525);
    assert_eq!(bought.reason, "bullish MA cross");
    assert!(matches!(report.acquisition, Some(OrderOutcome::Filled { .. })));

    let content = tokio::fs::read_to_string(&log).await.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]
        .contains("| De: BTC (0.01000000) -> A: USDT (500.00000000) | Resultado: GANANCIA"));
    assert!(lines[1].contains("-> A: ETH (0.25250000) | Resultado: PÉRDIDA"));
    assert!(lines[1].ends_with("| Motivo: bullish MA cross"));

    assert_eq!(*rotator.phase_handle().read().await, CyclePhase::Acquiring);
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn liquidation_follows_the_configured_quote_asset() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("BTCFDUSD", flat_candles(50_000.0))
            .with_balance("BTC", 0.01)
            .with_balance("FDUSD", 5.0),
    );
    let log = temp_log();
    let settings = RotationSettings {
        quote_asset: "FDUSD".to_string(),
        ..RotationSettings::default()
    };
    let rotator = rotator(gateway.clone(), manual_clock(), &log, settings);

    let report = rotator.run_cycle().await.unwrap();

    assert!(approx(report.quote_after_liquidation, 505.0));
    assert_eq!(report.conversions.len(), 1);
    let sold = &report.conversions[0];
    assert_eq!(sold.dest_asset, "FDUSD");
    assert_eq!(sold.reason, "Conversión a FDUSD para rotación");

    let content = tokio::fs::read_to_string(&log).await.unwrap();
    assert!(content.trim_end().ends_with("| Motivo: Conversión a FDUSD para rotación"));
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn failed_sells_add_nothing_and_log_a_full_loss() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("DOGEUSDT", flat_candles(0.1))
            .failing_order("DOGEUSDT")
            .with_balance("DOGE", 100.0)
            .with_balance("XYZ", 5.0)
            .with_balance("USDT", 10.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert!(report.target.is_none());
    assert_eq!(report.quote_after_liquidation, 10.0);
    assert!(report.acquisition.is_none());

    // DOGE reached the exchange and was rejected; XYZ has no market at all.
    let orders = gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].symbol, "DOGEUSDT");

    assert_eq!(report.conversions.len(), 2);
    let expected = [("DOGE", 100.0), ("XYZ", 5.0)];
    for (record, (asset, amount)) in report.conversions.iter().zip(expected) {
        assert_eq!(record.source_asset, asset);
        assert_eq!(record.source_amount, amount);
        assert_eq!(record.dest_asset, "USDT");
        assert_eq!(record.dest_amount, 0.0);
        assert_eq!(record.outcome, ConversionOutcome::Loss);
        assert_eq!(record.delta, -amount);
    }

    let content = tokio::fs::read_to_string(&log).await.unwrap();
    assert_eq!(content.lines().count(), 2);
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn no_match_keeps_capital_parked() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("BTCUSDT", flat_candles(50_000.0))
            .with_symbol("ETHUSDT", flat_candles(2_000.0))
            .with_balance("USDT", 1_000.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert!(report.target.is_none());
    assert!(report.acquisition.is_none());
    assert!(report.conversions.is_empty());
    assert_eq!(report.quote_after_liquidation, 1_000.0);
    assert!(gateway.orders().is_empty());
    assert_eq!(gateway.scanned(), vec!["BTCUSDT", "ETHUSDT"]);
    assert!(!log.exists());
}

#[tokio::test]
async fn dust_balance_skips_the_purchase() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("ETHUSDT", rising_candles(2_000.0))
            .with_balance("USDT", 0.00005),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert_eq!(report.target.as_ref().map(|t| t.symbol.as_str()), Some("ETHUSDT"));
    assert!(report.acquisition.is_none());
    assert!(report.conversions.is_empty());
    assert!(gateway.orders().is_empty());
}

#[tokio::test]
async fn failed_buy_is_logged_with_zero_quantity() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("SOLUSDT", rising_candles(150.0))
            .failing_order("SOLUSDT")
            .with_balance("USDT", 300.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert!(matches!(report.acquisition, Some(OrderOutcome::Failed { .. })));
    assert_eq!(report.conversions.len(), 1);
    let record = &report.conversions[0];
    assert_eq!((record.source_asset.as_str(), record.dest_asset.as_str()), ("USDT", "SOL"));
    assert_eq!(record.source_amount, 300.0);
    assert_eq!(record.dest_amount, 0.0);
    assert_eq!(record.outcome, ConversionOutcome::Loss);
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn first_match_in_scan_order_wins() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("AAAUSDT", flat_candles(1.0))
            .with_symbol("BBBUSDT", rising_candles(2.0))
            .with_symbol("CCCUSDT", rising_candles(3.0))
            .with_balance("USDT", 100.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert_eq!(report.target.unwrap().symbol, "BBBUSDT");
    // Scanning stops at the first match.
    assert_eq!(gateway.scanned(), vec!["AAAUSDT", "BBBUSDT"]);
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn concurrent_scan_still_resolves_by_scan_order() {
    // BBB answers last but comes first in the universe.
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("AAAUSDT", flat_candles(1.0))
            .with_symbol("BBBUSDT", rising_candles(2.0))
            .with_symbol("CCCUSDT", rising_candles(3.0))
            .delayed("BBBUSDT", Duration::from_millis(50))
            .with_balance("USDT", 100.0),
    );
    let log = temp_log();
    let settings = RotationSettings {
        scan_concurrency: 3,
        ..RotationSettings::default()
    };
    let rotator = rotator(gateway.clone(), manual_clock(), &log, settings);

    let target = rotator.scan(&gateway.universe).await.unwrap();

    assert_eq!(target.symbol, "BBBUSDT");
}

#[tokio::test]
async fn broken_symbols_are_skipped() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_broken_symbol("GONEUSDT")
            .with_symbol("NEWUSDT", rising_candles(1.0)[..5].to_vec())
            .with_symbol("GOODUSDT", rising_candles(10.0))
            .with_balance("USDT", 50.0),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert_eq!(report.target.unwrap().symbol, "GOODUSDT");
    assert_eq!(gateway.scanned(), vec!["GONEUSDT", "NEWUSDT", "GOODUSDT"]);
    let _ = tokio::fs::remove_file(&log).await;
}

#[tokio::test]
async fn universe_outage_is_retried_then_propagated() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("ETHUSDT", rising_candles(2_000.0))
            .with_balance("BTC", 1.0)
            .failing_universe(u32::MAX),
    );
    let clock = manual_clock();
    let log = temp_log();
    let settings = RotationSettings {
        fetch_retries: 3,
        ..RotationSettings::default()
    };
    let rotator = rotator(gateway.clone(), clock.clone(), &log, settings);

    assert!(rotator.run_cycle().await.is_err());
    assert_eq!(clock.sleep_count(), 2);
    assert_eq!(clock.total_slept(), Duration::from_secs(3));
    assert!(gateway.orders().is_empty());
    assert!(!log.exists());
}

#[tokio::test]
async fn transient_universe_outage_recovers() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_symbol("ETHUSDT", rising_candles(2_000.0))
            .with_balance("USDT", 100.0)
            .failing_universe(1),
    );
    let log = temp_log();
    let rotator = rotator(gateway.clone(), manual_clock(), &log, RotationSettings::default());

    let report = rotator.run_cycle().await.unwrap();

    assert_eq!(report.target.unwrap().symbol, "ETHUSDT");
    let _ = tokio::fs::remove_file(&log).await;
}
