/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Returns `None` until at least `period + 1` closed price values are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// RSI of the most recent close (oldest first input).
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        compute_rsi(closes, self.period).and_then(|series| series.last().copied())
    }
}

/// RSI for every position of `closes`, same length as the input.
///
/// The average gain/loss is seeded from the first `period` changes and
/// indices `0..period` carry that seed value. Index `i >= period` applies one
/// Wilder smoothing step with the change ending at `i - 1`, so the last seed
/// change is smoothed in a second time at index `period`.
/// Returns `None` when `closes.len() <= period` or `period == 0`.
pub fn compute_rsi(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let initial = &changes[..period];

    let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss =
        initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>() / period as f64;

    let mut series = vec![rsi_value(avg_gain, avg_loss); period];
    series.reserve(closes.len() - period);

    for &change in &changes[period - 1..] {
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { change.abs() } else { 0.0 };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        series.push(rsi_value(avg_gain, avg_loss));
    }

    Some(series)
}

/// Zero average loss yields 100: the `100 / (1 + RS)` term is taken as 0.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
