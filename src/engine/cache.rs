//! Cooldown cache.
//!
//! Remembers, per pool name, when a position was last opened so the same
//! farm is not re-entered inside the cooldown window. The backing store
//! is injectable; all access goes through one async mutex so that a
//! check followed by a write is never interleaved with another scan.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Default re-entry window.
pub const DEFAULT_COOLDOWN_SECS: i64 = 24 * 60 * 60;

/// Keyed storage for last-entry timestamps.
pub trait CooldownStore: Send {
    fn get(&self, pool_name: &str) -> Option<DateTime<Utc>>;

    /// Insert or overwrite.
    fn put(&mut self, pool_name: &str, at: DateTime<Utc>);

    /// Drop every entry stamped strictly before `cutoff`. Returns how many
    /// were dropped.
    fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> usize;

    /// All entries, unordered.
    fn entries(&self) -> Vec<(String, DateTime<Utc>)>;
}

/// Process-local `HashMap` store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, DateTime<Utc>>,
}

impl CooldownStore for MemoryStore {
    fn get(&self, pool_name: &str) -> Option<DateTime<Utc>> {
        self.entries.get(pool_name).copied()
    }

    fn put(&mut self, pool_name: &str, at: DateTime<Utc>) {
        self.entries.insert(pool_name.to_string(), at);
    }

    fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, at| *at >= cutoff);
        before - self.entries.len()
    }

    fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.entries.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

/// Cooldown bookkeeping keyed by pool name.
pub struct PositionCache {
    store: Mutex<Box<dyn CooldownStore>>,
    window: Duration,
}

impl PositionCache {
    pub fn new(window: Duration) -> Self {
        Self::with_store(Box::<MemoryStore>::default(), window)
    }

    pub fn with_store(store: Box<dyn CooldownStore>, window: Duration) -> Self {
        Self {
            store: Mutex::new(store),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn cooling(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last.is_some_and(|at| now - at < self.window)
    }

    /// True iff the pool was entered less than one window before `now`.
    pub async fn is_on_cooldown(&self, pool_name: &str, now: DateTime<Utc>) -> bool {
        let store = self.store.lock().await;
        self.cooling(store.get(pool_name), now)
    }

    /// Unconditionally stamp `pool_name` with `now`.
    pub async fn record(&self, pool_name: &str, now: DateTime<Utc>) {
        self.store.lock().await.put(pool_name, now);
    }

    /// Check and stamp in one critical section. Returns `false` (and
    /// leaves the entry alone) if the pool is still cooling down.
    pub async fn try_claim(&self, pool_name: &str, now: DateTime<Utc>) -> bool {
        let mut store = self.store.lock().await;
        if self.cooling(store.get(pool_name), now) {
            return false;
        }
        store.put(pool_name, now);
        true
    }

    /// Drop entries whose window has fully elapsed. Such entries already
    /// answer "not cooling", so this only bounds memory.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let removed = self.store.lock().await.remove_older_than(now - self.window);
        if removed > 0 {
            debug!(removed, "Evicted expired cooldown entries");
        }
        removed
    }

    /// Snapshot of `(pool_name, last_entry)` pairs, newest first.
    pub async fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut entries = self.store.lock().await.entries();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.entries().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
