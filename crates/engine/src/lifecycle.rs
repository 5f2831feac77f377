use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{error, info};

use common::{describe_signals, CyclePhase, Result};

use crate::clock::Clock;
use crate::rotator::Rotator;
use crate::scheduler::{Scheduler, Tick};

/// Cloneable handle for observing and stopping a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    phase: Arc<RwLock<CyclePhase>>,
    cycles: Arc<AtomicU64>,
}

impl EngineHandle {
    /// Ask the engine to stop. An in-flight cycle runs to completion; the
    /// idle wait that follows is cut short.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn phase(&self) -> CyclePhase {
        *self.phase.read().await
    }

    /// Number of completed rotation cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

/// The main engine: runs rotation cycles back to back, idling between them.
pub struct Engine {
    rotator: Rotator,
    scheduler: Scheduler,
    phase: Arc<RwLock<CyclePhase>>,
    cycles: Arc<AtomicU64>,
}

impl Engine {
    pub fn new(
        rotator: Rotator,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let phase = rotator.phase_handle();
        let cycles = Arc::new(AtomicU64::new(0));

        let handle = EngineHandle {
            shutdown_tx: Arc::new(shutdown_tx),
            phase: phase.clone(),
            cycles: cycles.clone(),
        };

        let engine = Engine {
            rotator,
            scheduler: Scheduler::new(clock, interval, shutdown_rx),
            phase,
            cycles,
        };

        (engine, handle)
    }

    /// Run until shutdown is requested (`Ok`) or a cycle hits an unrecoverable
    /// fetch error (`Err`). Call from `tokio::spawn`.
    pub async fn run(mut self) -> Result<()> {
        info!(interval = ?self.scheduler.interval(), "Engine started");

        while !self.scheduler.is_shutdown() {
            let report = match self.rotator.run_cycle().await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Rotation cycle aborted");
                    *self.phase.write().await = CyclePhase::Stopped;
                    return Err(e);
                }
            };

            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                cycle,
                target = report.target.as_ref().map(|t| t.symbol.as_str()).unwrap_or("-"),
                signals = %report
                    .target
                    .as_ref()
                    .map(|t| describe_signals(&t.signals))
                    .unwrap_or_default(),
                quote_total = report.quote_after_liquidation,
                conversions = report.conversions.len(),
                acquired = report.acquisition.as_ref().is_some_and(|o| o.is_filled()),
                "Rotation cycle complete"
            );

            *self.phase.write().await = CyclePhase::Idle;
            if self.scheduler.wait().await == Tick::Shutdown {
                break;
            }
        }

        *self.phase.write().await = CyclePhase::Stopped;
        info!("Engine stopped");
        Ok(())
    }
}
