//! Exit monitor.
//!
//! Owns one open position and polls its price until an exit rule fires:
//!
//! - take-profit: `price >= entry * multiplier` once `take_profit_after`
//!   has elapsed
//! - stop-loss: `price < entry` once `stop_loss_after` has elapsed
//!
//! A position that satisfies neither is watched indefinitely. On exit a
//! single sell request is issued and the monitor is closed whatever the
//! outcome of that request.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::Clock;
use crate::exchange::degrade::{discard_trade_failure, price_or_zero};
use crate::exchange::{QuoteClient, TradeClient};
use crate::types::{ExitReason, MonitorState, Position};

// ---------------------------------------------------------------------------
// Exit rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ExitRules {
    pub price_multiplier: Decimal,
    pub take_profit_after: Duration,
    pub stop_loss_after: Duration,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            price_multiplier: dec!(2),
            take_profit_after: Duration::seconds(600),
            stop_loss_after: Duration::seconds(1800),
        }
    }
}

impl ExitRules {
    /// Decide whether `position` should be closed at `price` and `now`.
    /// Take-profit is checked first. A take-profit target that overflows
    /// `Decimal` is never reached.
    pub fn evaluate(
        &self,
        position: &Position,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<ExitReason> {
        let elapsed = position.elapsed(now);

        let target = position.entry_price.checked_mul(self.price_multiplier);
        if target.is_some_and(|t| price >= t) && elapsed >= self.take_profit_after {
            return Some(ExitReason::Profit);
        }

        if price < position.entry_price && elapsed >= self.stop_loss_after {
            return Some(ExitReason::Loss);
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Observable state of a running monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub position: Position,
    pub state: MonitorState,
    pub last_price: Option<Decimal>,
    pub last_checked: Option<DateTime<Utc>>,
    pub polls: u64,
}

impl MonitorSnapshot {
    fn new(position: Position) -> Self {
        Self {
            position,
            state: MonitorState::Watching,
            last_price: None,
            last_checked: None,
            polls: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct ExitMonitor {
    position: Position,
    rules: ExitRules,
    poll_interval: std::time::Duration,
    quotes: Arc<dyn QuoteClient>,
    trades: Arc<dyn TradeClient>,
    clock: Arc<dyn Clock>,
    status: watch::Sender<MonitorSnapshot>,
}

impl ExitMonitor {
    pub fn new(
        position: Position,
        rules: ExitRules,
        poll_interval: std::time::Duration,
        quotes: Arc<dyn QuoteClient>,
        trades: Arc<dyn TradeClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(MonitorSnapshot::new(position.clone()));
        Self {
            position,
            rules,
            poll_interval,
            quotes,
            trades,
            clock,
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.position.id
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Receiver that tracks this monitor's snapshot.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.status.subscribe()
    }

    fn set_state(&self, state: MonitorState) {
        self.status.send_modify(|s| s.state = state);
    }

    /// Poll once. Returns the exit reason if the position should close.
    pub async fn tick(&self) -> Option<ExitReason> {
        let price = price_or_zero(self.quotes.as_ref(), &self.position.pool_address).await;
        let now = self.clock.now();

        self.status.send_modify(|s| {
            s.last_price = Some(price);
            s.last_checked = Some(now);
            s.polls += 1;
        });

        let decision = self.rules.evaluate(&self.position, price, now);
        if decision.is_none() {
            debug!(
                pool = %self.position.pool_name,
                price = %price,
                entry = %self.position.entry_price,
                elapsed_secs = self.position.elapsed(now).num_seconds(),
                "Exit conditions not met"
            );
        }
        decision
    }

    /// Issue the sell and mark the monitor closed. No retry.
    async fn close(&self, reason: ExitReason) {
        self.set_state(MonitorState::Closing(reason));
        info!(
            position = %self.position.id,
            pool = %self.position.pool_name,
            reason = %reason,
            "Closing position"
        );

        let result = self.trades.sell(&self.position.pool_address).await;
        discard_trade_failure("sell", &self.position.pool_address, result);

        self.set_state(MonitorState::Closed(reason));
    }

    /// Watch the position until an exit rule fires, then sell.
    pub async fn run(self) -> ExitReason {
        info!(position = %self.position, "Monitoring position");

        loop {
            if let Some(reason) = self.tick().await {
                self.close(reason).await;
                return reason;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
