use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::clock::Clock;

/// Why `Scheduler::wait` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The full idle interval elapsed; start the next cycle.
    Elapsed,
    /// Shutdown was requested; stop the engine.
    Shutdown,
}

/// Fixed-interval pacing between rotation cycles, interruptible by a
/// shutdown flag.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            clock,
            interval,
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for one interval unless shutdown is (or becomes) requested.
    pub async fn wait(&mut self) -> Tick {
        if self.is_shutdown() {
            return Tick::Shutdown;
        }

        debug!(interval = ?self.interval, "Idle until next cycle");
        let shutdown = &mut self.shutdown;
        let stop = async move {
            // A dropped sender can never request shutdown; never resolve.
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = self.clock.sleep(self.interval) => Tick::Elapsed,
            _ = stop => Tick::Shutdown,
        }
    }
}
