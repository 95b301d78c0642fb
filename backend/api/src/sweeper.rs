//! Long-running background task that demotes expired open requests from the
//! visible board.
//!
//! Purely cosmetic maintenance: the atomic expiry check inside `claim` is the
//! source of truth, so correctness never depends on this loop running.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use wasteloop_engine::WasteLoop;

/// Spawn the sweep loop as a background [`tokio`] task.
pub async fn run(engine: Arc<WasteLoop>, interval_secs: u64) {
    info!("Expiry sweeper starting — interval {interval_secs}s");

    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        let demoted = engine.sweep_expired();
        if demoted > 0 {
            info!(demoted, "swept expired requests off the board");
        } else {
            debug!("sweep found nothing to demote");
        }
    }
}
