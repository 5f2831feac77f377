use tracing::trace;

use common::{Candle, PatternSignal, PriceSeries};

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::indicators::{simple_moving_average, RsiIndicator};

/// Indicator values for the latest candle of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
}

/// One bullish condition. Rules are independent of each other.
pub trait PatternRule: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect the latest candle and its indicators; `None` when the
    /// condition does not hold.
    fn check(&self, latest: &Candle, snapshot: &IndicatorSnapshot) -> Option<PatternSignal>;
}

struct MaCrossRule;

impl PatternRule for MaCrossRule {
    fn name(&self) -> &str {
        "ma_cross"
    }

    fn check(&self, _latest: &Candle, snapshot: &IndicatorSnapshot) -> Option<PatternSignal> {
        (snapshot.fast_ma > snapshot.slow_ma).then_some(PatternSignal::BullishMaCross {
            fast: snapshot.fast_ma,
            slow: snapshot.slow_ma,
        })
    }
}

struct RsiOversoldRule {
    threshold: f64,
}

impl PatternRule for RsiOversoldRule {
    fn name(&self) -> &str {
        "rsi_oversold"
    }

    fn check(&self, _latest: &Candle, snapshot: &IndicatorSnapshot) -> Option<PatternSignal> {
        (snapshot.rsi < self.threshold).then_some(PatternSignal::RsiOversold {
            value: snapshot.rsi,
        })
    }
}

struct HammerRule {
    shadow_factor: f64,
}

impl PatternRule for HammerRule {
    fn name(&self) -> &str {
        "bullish_hammer"
    }

    fn check(&self, c: &Candle, _snapshot: &IndicatorSnapshot) -> Option<PatternSignal> {
        let body = (c.close - c.open).abs();
        let lower_shadow = c.open.min(c.close) - c.low;
        let upper_shadow = c.high - c.open.max(c.close);

        // All comparisons are strict.
        let is_hammer = body < lower_shadow
            && lower_shadow > self.shadow_factor * body
            && upper_shadow < body;
        is_hammer.then_some(PatternSignal::BullishHammer)
    }
}

/// Runs the rule set over one symbol's candles.
///
/// Rules are evaluated in a fixed order (MA cross, RSI oversold, hammer)
/// and every match is appended, so the output order never depends on the data.
pub struct PatternDetector {
    config: DetectorConfig,
    rsi: RsiIndicator,
    rules: Vec<Box<dyn PatternRule>>,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let rules: Vec<Box<dyn PatternRule>> = vec![
            Box::new(MaCrossRule),
            Box::new(RsiOversoldRule {
                threshold: config.rsi_oversold,
            }),
            Box::new(HammerRule {
                shadow_factor: config.hammer_shadow_factor,
            }),
        ];
        Self {
            rsi: RsiIndicator::new(config.rsi_period),
            config,
            rules,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn snapshot(&self, series: &PriceSeries) -> Result<IndicatorSnapshot, DetectorError> {
        let needed = self.config.min_candles();
        if series.len() < needed {
            return Err(DetectorError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let closes = series.closes();
        let insufficient = || DetectorError::InsufficientData {
            needed,
            got: closes.len(),
        };

        let rsi = self.rsi.compute(&closes).ok_or_else(insufficient)?;
        let fast_ma = simple_moving_average(&closes, self.config.fast_ma).ok_or_else(insufficient)?;
        let slow_ma = simple_moving_average(&closes, self.config.slow_ma).ok_or_else(insufficient)?;

        Ok(IndicatorSnapshot {
            rsi,
            fast_ma,
            slow_ma,
        })
    }

    /// All signals for the latest candle of `series`, possibly none.
    pub fn detect(&self, series: &PriceSeries) -> Result<Vec<PatternSignal>, DetectorError> {
        let snapshot = self.snapshot(series)?;
        let latest = series.last().ok_or(DetectorError::InsufficientData {
            needed: self.config.min_candles(),
            got: 0,
        })?;

        let signals: Vec<PatternSignal> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let signal = rule.check(latest, &snapshot);
                if signal.is_some() {
                    trace!(symbol = %series.symbol(), rule = rule.name(), "Rule matched");
                }
                signal
            })
            .collect();

        Ok(signals)
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Candles closing at `closes`, with the last candle replaced.
    fn series_ending_with(closes: &[f64], last: Candle) -> PriceSeries {
        let mut candles: Vec<Candle> = closes
            .iter()
            .map(|&c| Candle::new(c, c + 0.1, c - 0.1, c))
            .collect();
        if let Some(slot) = candles.last_mut() {
            *slot = last;
        }
        PriceSeries::new("TESTUSDT", candles)
    }

    fn neutral_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 50.0,
            fast_ma: 1.0,
            slow_ma: 1.0,
        }
    }

    #[test]
    fn hammer_boundary_is_strict() {
        // body 0.5, lower shadow 1.0 = 2 × body → not a hammer
        let rule = HammerRule { shadow_factor: 2.0 };
        let candle = Candle::new(10.0, 10.6, 9.0, 10.5);
        assert!(rule.check(&candle, &neutral_snapshot()).is_none());
    }

    #[test]
    fn hammer_fires_on_long_lower_shadow() {
        let rule = HammerRule { shadow_factor: 2.0 };
        let candle = Candle::new(10.0, 10.25, 9.0, 10.2);
        assert_eq!(
            rule.check(&candle, &neutral_snapshot()),
            Some(PatternSignal::BullishHammer)
        );
    }

    #[test]
    fn hammer_rejects_long_upper_shadow() {
        let rule = HammerRule { shadow_factor: 2.0 };
        let candle = Candle::new(10.0, 11.0, 9.0, 10.2);
        assert!(rule.check(&candle, &neutral_snapshot()).is_none());
    }

    #[test]
    fn short_series_is_an_error() {
        let detector = PatternDetector::default();
        let closes = vec![100.0; 19];
        let series = series_ending_with(&closes, Candle::new(100.0, 100.0, 100.0, 100.0));
        let err = detector.detect(&series).unwrap_err();
        assert!(matches!(
            err,
            DetectorError::InsufficientData { needed: 20, got: 19 }
        ));
    }

    #[test]
    fn rising_series_crosses_but_is_never_oversold() {
        let detector = PatternDetector::default();
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let series = PriceSeries::new(
            "UPUSDT",
            closes.iter().map(|&c| Candle::new(c - 0.5, c, c - 0.5, c)).collect(),
        );
        let snapshot = detector.snapshot(&series).unwrap();
        assert_eq!(snapshot.rsi, 100.0);

        let signals = detector.detect(&series).unwrap();
        assert_eq!(
            signals,
            vec![PatternSignal::BullishMaCross {
                fast: snapshot.fast_ma,
                slow: snapshot.slow_ma
            }]
        );
    }

    #[test]
    fn all_rules_fire_in_fixed_order() {
        // One sharp drop still dominates the smoothed losses (RSI ≈ 32) while
        // the slow climb afterwards lifts SMA(5) over SMA(20); the final
        // candle is a hammer.
        let mut closes = vec![100.0; 19];
        closes.push(50.0);
        closes.extend((1..=20).map(|i| 50.0 + i as f64 * 0.5));
        let series = series_ending_with(&closes, Candle::new(59.8, 60.05, 59.0, 60.0));

        let detector = PatternDetector::default();
        let first = detector.detect(&series).unwrap();
        let names: Vec<String> = first.iter().map(ToString::to_string).collect();
        assert_eq!(names.len(), 3, "unexpected signals: {names:?}");
        assert_eq!(names[0], "bullish MA cross");
        assert!(names[1].starts_with("RSI oversold("));
        assert_eq!(names[2], "bullish hammer");

        // Deterministic for identical input.
        assert_eq!(detector.detect(&series).unwrap(), first);
    }

    #[test]
    fn quiet_market_has_no_signals() {
        let detector = PatternDetector::default();
        let closes = vec![100.0; 30];
        let series = series_ending_with(&closes, Candle::new(100.0, 100.1, 99.9, 100.0));
        assert!(detector.detect(&series).unwrap().is_empty());
    }
}
