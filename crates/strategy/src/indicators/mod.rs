pub mod rsi;
pub mod sma;

pub use rsi::{compute_rsi, RsiIndicator};
pub use sma::simple_moving_average;
