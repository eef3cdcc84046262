//! Periodic scan driver.
//!
//! Runs `check_farms` at a fixed rate from launch, the first tick firing
//! immediately. Missed ticks use `MissedTickBehavior::Delay`, so a slow
//! scan pushes the schedule back instead of triggering a burst of
//! catch-up scans. A failed scan is logged and the next tick starts over.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::scanner::FarmScanner;

/// Run `check_farms` every `every`, starting immediately, until the task
/// is aborted. Errors are logged and the next tick retries from scratch.
pub fn spawn_periodic_scan(scanner: Arc<FarmScanner>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            info!("Starting scheduled farm check");
            if let Err(e) = scanner.check_farms().await {
                warn!(error = %e, "Scheduled farm check failed, retrying next tick");
            }
        }
    })
}
