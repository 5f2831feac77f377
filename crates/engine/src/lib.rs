pub mod binance;
pub mod clock;
pub mod executor;
pub mod lifecycle;
pub mod retry;
pub mod rotator;
pub mod scheduler;

pub use binance::BinanceClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::OrderExecutor;
pub use lifecycle::{Engine, EngineHandle};
pub use rotator::{
    liquidation_reason, CycleReport, RotationSettings, Rotator, Selection,
};
pub use scheduler::{Scheduler, Tick};
