//! Registry of running exit monitors.
//!
//! Each spawned monitor is a tokio task paired with a `watch` receiver for
//! its snapshot, so open positions can be listed and cancelled from the
//! command surface or the dashboard.

use std::collections::HashMap;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::monitor::{ExitMonitor, MonitorSnapshot};
use crate::types::MonitorState;

struct MonitorEntry {
    status: watch::Receiver<MonitorSnapshot>,
    handle: JoinHandle<()>,
    cancelled: bool,
}

impl MonitorEntry {
    fn snapshot(&self) -> MonitorSnapshot {
        let mut snap = self.status.borrow().clone();
        if self.cancelled {
            snap.state = MonitorState::Cancelled;
        }
        snap
    }

    fn is_finished(&self) -> bool {
        self.cancelled || self.handle.is_finished()
    }
}

#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<HashMap<Uuid, MonitorEntry>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `monitor` on the runtime and track it. Returns the position id.
    pub async fn spawn(&self, monitor: ExitMonitor) -> Uuid {
        let id = monitor.id();
        let status = monitor.subscribe();
        let handle = tokio::spawn(async move {
            let reason = monitor.run().await;
            debug!(position = %id, reason = %reason, "Monitor finished");
        });

        self.monitors.write().await.insert(
            id,
            MonitorEntry {
                status,
                handle,
                cancelled: false,
            },
        );
        id
    }

    /// Snapshots of every tracked monitor, oldest entry first.
    pub async fn snapshots(&self) -> Vec<MonitorSnapshot> {
        let monitors = self.monitors.read().await;
        let mut snaps: Vec<MonitorSnapshot> = monitors.values().map(MonitorEntry::snapshot).collect();
        snaps.sort_by_key(|s| s.position.entry_time);
        snaps
    }

    pub async fn get(&self, id: Uuid) -> Option<MonitorSnapshot> {
        self.monitors.read().await.get(&id).map(MonitorEntry::snapshot)
    }

    /// Monitors still watching or closing.
    pub async fn open_count(&self) -> usize {
        self.monitors
            .read()
            .await
            .values()
            .filter(|e| !e.is_finished())
            .count()
    }

    /// Abort a monitor without selling. Returns `false` for unknown ids and
    /// for monitors that already finished.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let mut monitors = self.monitors.write().await;
        match monitors.get_mut(&id) {
            Some(entry) if !entry.is_finished() => {
                entry.handle.abort();
                entry.cancelled = true;
                info!(position = %id, "Monitor cancelled");
                true
            }
            _ => false,
        }
    }

    /// Abort every open monitor. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let mut monitors = self.monitors.write().await;
        let mut count = 0;
        for entry in monitors.values_mut().filter(|e| !e.is_finished()) {
            entry.handle.abort();
            entry.cancelled = true;
            count += 1;
        }
        count
    }

    /// Forget monitors that have closed or been cancelled.
    pub async fn prune_finished(&self) -> usize {
        let mut monitors = self.monitors.write().await;
        let before = monitors.len();
        monitors.retain(|_, e| !e.is_finished());
        before - monitors.len()
    }

    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::monitor::ExitRules;
    use crate::engine::SystemClock;
    use crate::exchange::{MockQuoteClient, MockTradeClient};
    use crate::types::{ExitReason, Farm, Position, TxParams};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn monitor(price: rust_decimal::Decimal, opened_secs_ago: i64, sells: usize) -> ExitMonitor {
        let mut quotes = MockQuoteClient::new();
        quotes.expect_get_price().returning(move |_| Ok(price));
        let mut trades = MockTradeClient::new();
        trades
            .expect_sell()
            .times(sells)
            .returning(|_| Ok(TxParams(serde_json::Map::new())));

        let position = Position::open(
            &Farm::sample("TON/NOT", "pause_all"),
            dec!(1.0),
            Utc::now() - Duration::seconds(opened_secs_ago),
        );
        ExitMonitor::new(
            position,
            ExitRules::default(),
            std::time::Duration::from_millis(10),
            Arc::new(quotes),
            Arc::new(trades),
            Arc::new(SystemClock),
        )
    }

    async fn wait_finished(registry: &MonitorRegistry) {
        for _ in 0..200 {
            if registry.open_count().await == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("monitor did not finish");
    }

    #[tokio::test]
    async fn test_spawn_and_close() {
        let registry = MonitorRegistry::new();
        let id = registry.spawn(monitor(dec!(3.0), 700, 1)).await;

        wait_finished(&registry).await;
        let snap = registry.get(id).await.unwrap();
        assert_eq!(snap.state, MonitorState::Closed(ExitReason::Profit));

        assert_eq!(registry.prune_finished().await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancel_watching_monitor() {
        let registry = MonitorRegistry::new();
        // Price flat at entry: watched forever, never sold.
        let id = registry.spawn(monitor(dec!(1.0), 0, 0)).await;
        assert_eq!(registry.open_count().await, 1);

        assert!(registry.cancel(id).await);
        assert!(!registry.cancel(id).await);
        assert_eq!(registry.open_count().await, 0);
        assert_eq!(registry.get(id).await.unwrap().state, MonitorState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id() {
        let registry = MonitorRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_cancel_all_and_snapshots() {
        let registry = MonitorRegistry::new();
        registry.spawn(monitor(dec!(1.0), 0, 0)).await;
        registry.spawn(monitor(dec!(1.2), 0, 0)).await;
        assert_eq!(registry.snapshots().await.len(), 2);

        assert_eq!(registry.cancel_all().await, 2);
        assert_eq!(registry.open_count().await, 0);
        assert_eq!(registry.prune_finished().await, 2);
    }
}
