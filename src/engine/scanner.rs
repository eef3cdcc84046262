//! Farm scanner.
//!
//! One `check_farms` call lists the farm catalog, filters it with the
//! entry rule, claims the cooldown for each eligible farm, requests the
//! buy, captures the entry price, and hands the new position to an exit
//! monitor. Monitors run on their own tasks; the scan returns once every
//! entry has been handed off.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::PositionCache;
use super::monitor::{ExitMonitor, ExitRules};
use super::registry::MonitorRegistry;
use super::Clock;
use crate::exchange::degrade::{discard_trade_failure, price_or_zero};
use crate::exchange::{QuoteClient, TradeClient};
use crate::types::{ExchangeError, Farm, Position};

// ---------------------------------------------------------------------------
// Settings and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Amount of the base asset offered on each buy.
    pub purchase_amount: Decimal,
    pub exit_rules: ExitRules,
    /// Delay between exit monitor price polls.
    pub poll_interval: Duration,
    /// Drop expired cooldown entries after each successful listing.
    pub evict_expired: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            purchase_amount: Decimal::from(100),
            exit_rules: ExitRules::default(),
            poll_interval: Duration::from_secs(60),
            evict_expired: true,
        }
    }
}

/// A position opened during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct EnteredFarm {
    pub position_id: Uuid,
    pub pool_name: String,
    pub pool_address: String,
    pub entry_price: Decimal,
    /// Whether the buy request returned transaction parameters.
    pub buy_accepted: bool,
}

/// Outcome of one `check_farms` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub farms_listed: usize,
    pub eligible: usize,
    pub ineligible: usize,
    pub skipped_cooldown: usize,
    pub entered: Vec<EnteredFarm>,
}

impl std::fmt::Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} farms listed, {} eligible, {} on cooldown, {} entered",
            self.farms_listed,
            self.eligible,
            self.skipped_cooldown,
            self.entered.len()
        )
    }
}

/// Running totals kept across scans.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub positions_opened: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_report: Option<ScanReport>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct FarmScanner {
    quotes: Arc<dyn QuoteClient>,
    trades: Arc<dyn TradeClient>,
    cache: Arc<PositionCache>,
    registry: Arc<MonitorRegistry>,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
    stats: RwLock<ScanStats>,
}

impl FarmScanner {
    pub fn new(
        quotes: Arc<dyn QuoteClient>,
        trades: Arc<dyn TradeClient>,
        cache: Arc<PositionCache>,
        registry: Arc<MonitorRegistry>,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            quotes,
            trades,
            cache,
            registry,
            clock,
            settings,
            stats: RwLock::new(ScanStats::default()),
        }
    }

    pub fn cache(&self) -> &Arc<PositionCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    pub async fn stats(&self) -> ScanStats {
        self.stats.read().await.clone()
    }

    /// Run one scan cycle.
    ///
    /// A listing failure aborts the cycle before any farm is touched and
    /// is returned to the caller; the periodic driver logs it, the manual
    /// command reports it.
    pub async fn check_farms(&self) -> Result<ScanReport, ExchangeError> {
        let pruned = self.registry.prune_finished().await;
        if pruned > 0 {
            debug!(pruned, "Pruned finished monitors");
        }

        let farms = match self.quotes.list_farms().await {
            Ok(farms) => farms,
            Err(e) => {
                warn!(error = %e, "Farm listing failed, skipping cycle");
                let mut stats = self.stats.write().await;
                stats.scans_failed += 1;
                stats.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if self.settings.evict_expired {
            self.cache.evict_expired(self.clock.now()).await;
        }

        let mut report = ScanReport {
            farms_listed: farms.len(),
            ..ScanReport::default()
        };

        for farm in &farms {
            if !farm.is_eligible() {
                debug!(
                    pool = %farm.pool_name,
                    status = %farm.status,
                    version = %farm.version,
                    "Farm not eligible"
                );
                report.ineligible += 1;
                continue;
            }

            report.eligible += 1;
            info!(pool = %farm.pool_name, address = %farm.pool_address, "Eligible farm");

            match self.enter(farm).await {
                Some(entered) => report.entered.push(entered),
                None => report.skipped_cooldown += 1,
            }
        }

        info!(
            listed = report.farms_listed,
            eligible = report.eligible,
            cooldown = report.skipped_cooldown,
            entered = report.entered.len(),
            "Farm scan complete"
        );

        let mut stats = self.stats.write().await;
        stats.scans_completed += 1;
        stats.positions_opened += report.entered.len() as u64;
        stats.last_scan_at = Some(self.clock.now());
        stats.last_report = Some(report.clone());
        stats.last_error = None;

        Ok(report)
    }

    /// Open a position on `farm` unless it is cooling down.
    async fn enter(&self, farm: &Farm) -> Option<EnteredFarm> {
        if !self.cache.try_claim(&farm.pool_name, self.clock.now()).await {
            debug!(pool = %farm.pool_name, "Farm on cooldown, skipping");
            return None;
        }

        let buy = self
            .trades
            .buy(&farm.pool_address, self.settings.purchase_amount)
            .await;
        let buy_accepted = discard_trade_failure("buy", &farm.pool_address, buy);

        // Entry price is read after the buy request, not before.
        let entry_price = price_or_zero(self.quotes.as_ref(), &farm.pool_address).await;
        let entry_time = self.clock.now();
        self.cache.record(&farm.pool_name, entry_time).await;

        let position = Position::open(farm, entry_price, entry_time);
        let monitor = ExitMonitor::new(
            position,
            self.settings.exit_rules,
            self.settings.poll_interval,
            self.quotes.clone(),
            self.trades.clone(),
            self.clock.clone(),
        );
        let position_id = self.registry.spawn(monitor).await;

        info!(
            position = %position_id,
            pool = %farm.pool_name,
            entry_price = %entry_price,
            buy_accepted,
            "Position opened"
        );

        Some(EnteredFarm {
            position_id,
            pool_name: farm.pool_name.clone(),
            pool_address: farm.pool_address.clone(),
            entry_price,
            buy_accepted,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
