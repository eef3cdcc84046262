//! Shared types for the FARMBOT agent.
//!
//! Farms come from the exchange listing, positions are opened by the
//! scanner and owned by exactly one exit monitor. Kept free of engine
//! logic so the exchange clients and engine can both depend on them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Farm
// ---------------------------------------------------------------------------

/// Status value the exchange reports for farms we are willing to enter.
pub const ENTRY_STATUS: &str = "pause_all";

/// A liquidity farm as advertised by the exchange's `farm.list` call.
///
/// Snapshot only: discarded at the end of the scan cycle that fetched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub pool_address: String,
    pub pool_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
}

impl Farm {
    /// Entry rule: paused farm on a TON pair that is not a USDT pair.
    ///
    /// Substring tests are case-sensitive, matching the exchange's
    /// upper-case ticker names.
    pub fn is_eligible(&self) -> bool {
        self.status == ENTRY_STATUS
            && self.pool_name.contains("TON")
            && !self.pool_name.contains("USDT")
    }

    #[cfg(test)]
    pub fn sample(pool_name: &str, status: &str) -> Self {
        Farm {
            pool_address: format!("EQ-{}", pool_name.replace('/', "-")),
            pool_name: pool_name.to_string(),
            status: status.to_string(),
            version: "v2".to_string(),
        }
    }
}

impl fmt::Display for Farm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] status={} version={}",
            self.pool_name, self.pool_address, self.status, self.version
        )
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A held stake in one farm's token, tracked from buy to sell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub pool_address: String,
    pub pool_name: String,
    /// Price observed right after the buy request (not before it).
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    pub fn open(farm: &Farm, entry_price: Decimal, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool_address: farm.pool_address.clone(),
            pool_name: farm.pool_name.clone(),
            entry_price: entry_price.max(Decimal::ZERO),
            entry_time,
        }
    }

    /// Time held as of `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.entry_time
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} entry={} at {}",
            self.id,
            self.pool_name,
            self.entry_price,
            self.entry_time.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

// ---------------------------------------------------------------------------
// Exit reasons and monitor state
// ---------------------------------------------------------------------------

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Price multiple reached after the minimum hold time.
    Profit,
    /// Price below entry after the loss hold time.
    Loss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Profit => write!(f, "take-profit"),
            ExitReason::Loss => write!(f, "stop-loss"),
        }
    }
}

/// Lifecycle of an exit monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum MonitorState {
    Watching,
    Closing(ExitReason),
    Closed(ExitReason),
    /// Aborted from outside; no sell was issued.
    Cancelled,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Closed(_) | MonitorState::Cancelled)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Watching => write!(f, "watching"),
            MonitorState::Closing(r) => write!(f, "closing ({r})"),
            MonitorState::Closed(r) => write!(f, "closed ({r})"),
            MonitorState::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction parameters
// ---------------------------------------------------------------------------

/// Opaque transaction parameters returned by the swap endpoints, handed
/// to a downstream signer. Must be a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxParams(pub serde_json::Map<String, serde_json::Value>);

impl fmt::Display for TxParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "tx-params{{{}}}", keys.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures talking to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// Connection, DNS, timeout: the request never produced a response.
    #[error("Transport error ({endpoint}): {message}")]
    Transport { endpoint: String, message: String },

    /// Non-200 status, malformed body, or an application-level error.
    #[error("Protocol error ({endpoint}): {message}")]
    Protocol { endpoint: String, message: String },
}

impl ExchangeError {
    pub fn transport(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        ExchangeError::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn protocol(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        ExchangeError::Protocol {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ExchangeError::Transport { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
