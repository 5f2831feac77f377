use std::future::Future;
use std::time::Duration;

use tracing::warn;

use common::Result;

use crate::clock::Clock;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Run `op` up to `attempts` times with exponential backoff between tries.
/// The last error is returned once the attempts are exhausted.
pub async fn with_backoff<T, F, Fut>(
    clock: &dyn Clock,
    attempts: u32,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    what,
                    attempt,
                    attempts,
                    error = %e,
                    backoff = ?backoff,
                    "Fetch failed, retrying"
                );
                clock.sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
