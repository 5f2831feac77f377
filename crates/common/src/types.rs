use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC interval for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }
}

/// Candle window for one symbol, oldest first.
///
/// Built once per fetch and never mutated afterwards; indicators read it
/// through the slice accessors below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            candles,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Most recent candle, if any.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last().map(|c| c.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// Free (non-locked) quantity of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub asset: String,
    pub free: f64,
}

/// Account snapshot. Only strictly positive free quantities are kept,
/// in the order the exchange reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    holdings: Vec<Holding>,
}

impl Balances {
    pub fn from_free<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let holdings = entries
            .into_iter()
            .filter(|(_, free)| *free > 0.0)
            .map(|(asset, free)| Holding {
                asset: asset.into(),
                free,
            })
            .collect();
        Self { holdings }
    }

    /// Free quantity of `asset`, zero when not held.
    pub fn get(&self, asset: &str) -> f64 {
        self.holdings
            .iter()
            .find(|h| h.asset == asset)
            .map(|h| h.free)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

impl std::fmt::Display for Balances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .holdings
            .iter()
            .map(|h| format!("{}={}", h.asset, h.free))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Base asset of `symbol` when it is quoted in `quote` (`"BTCUSDT"` → `"BTC"`).
pub fn base_asset<'a>(symbol: &'a str, quote: &str) -> Option<&'a str> {
    symbol
        .strip_suffix(quote)
        .filter(|base| !base.is_empty())
}

/// Decimal places order quantities are expressed in.
pub const QUANTITY_DECIMALS: i32 = 6;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A market order to be submitted to the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Client order id, sent to the exchange as `newClientOrderId`.
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            symbol: symbol.into(),
            side,
            quantity,
        }
    }
}

/// Confirmation of a filled order returned by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub fill_price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of one sell or buy attempt. A failure is a regular value with a
/// zero amount, not an error: the cycle always carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled {
        /// Base-asset quantity that changed hands.
        quantity: f64,
        /// Amount received in the destination asset.
        proceeds: f64,
    },
    Failed {
        reason: String,
    },
}

impl OrderOutcome {
    /// Amount received in the destination asset, zero on failure.
    pub fn proceeds(&self) -> f64 {
        match self {
            OrderOutcome::Filled { proceeds, .. } => *proceeds,
            OrderOutcome::Failed { .. } => 0.0,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderOutcome::Filled { .. })
    }
}

/// Named condition found by the pattern detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternSignal {
    /// Fast SMA above slow SMA.
    BullishMaCross { fast: f64, slow: f64 },
    /// Latest RSI below the oversold threshold.
    RsiOversold { value: f64 },
    /// Long lower shadow, small body, short upper shadow on the latest candle.
    BullishHammer,
}

impl std::fmt::Display for PatternSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternSignal::BullishMaCross { .. } => write!(f, "bullish MA cross"),
            PatternSignal::RsiOversold { value } => write!(f, "RSI oversold({value:.1})"),
            PatternSignal::BullishHammer => write!(f, "bullish hammer"),
        }
    }
}

/// Joins signal names the way they appear in the conversion log reason.
pub fn describe_signals(signals: &[PatternSignal]) -> String {
    signals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a conversion left more units than it consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionOutcome {
    Gain,
    Loss,
}

impl std::fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionOutcome::Gain => write!(f, "GANANCIA"),
            ConversionOutcome::Loss => write!(f, "PÉRDIDA"),
        }
    }
}

/// One line of the conversion audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub timestamp: DateTime<Utc>,
    pub source_asset: String,
    pub source_amount: f64,
    pub dest_asset: String,
    pub dest_amount: f64,
    pub outcome: ConversionOutcome,
    pub delta: f64,
    pub reason: String,
}

impl ConversionRecord {
    /// Outcome and delta are derived from the raw amounts, with no price
    /// conversion between the two assets.
    pub fn new(
        timestamp: DateTime<Utc>,
        source_asset: impl Into<String>,
        source_amount: f64,
        dest_asset: impl Into<String>,
        dest_amount: f64,
        reason: impl Into<String>,
    ) -> Self {
        let outcome = if dest_amount > source_amount {
            ConversionOutcome::Gain
        } else {
            ConversionOutcome::Loss
        };
        Self {
            timestamp,
            source_asset: source_asset.into(),
            source_amount,
            dest_asset: dest_asset.into(),
            dest_amount,
            outcome,
            delta: dest_amount - source_amount,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConversionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | De: {} ({:.8}) -> A: {} ({:.8}) | Resultado: {} ({:.8}) | Motivo: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.source_asset,
            self.source_amount,
            self.dest_asset,
            self.dest_amount,
            self.outcome,
            self.delta,
            self.reason,
        )
    }
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Where the rotation engine is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    #[default]
    Stopped,
    Scanning,
    Liquidating,
    Acquiring,
    Idle,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Stopped => write!(f, "stopped"),
            CyclePhase::Scanning => write!(f, "scanning"),
            CyclePhase::Liquidating => write!(f, "liquidating"),
            CyclePhase::Acquiring => write!(f, "acquiring"),
            CyclePhase::Idle => write!(f, "idle"),
        }
    }
}
