/// Mean of the last `window` values of `closes` (oldest first).
/// Returns `None` if `window` is zero or longer than the series.
pub fn simple_moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}
