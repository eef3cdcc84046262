//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::monitor::MonitorSnapshot;
use crate::engine::scanner::{FarmScanner, ScanReport};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub scanner: Arc<FarmScanner>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(scanner: Arc<FarmScanner>) -> Self {
        Self {
            scanner,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub positions_opened: u64,
    pub open_positions: usize,
    pub cooldown_entries: usize,
    pub last_scan_at: Option<String>,
    pub last_report: Option<ScanReport>,
    pub last_error: Option<String>,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CooldownEntry {
    pub pool_name: String,
    pub last_entry: String,
    /// Seconds until re-entry is allowed; 0 once expired.
    pub remaining_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub id: Uuid,
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.scanner.stats().await;
    let open_positions = state.scanner.registry().open_count().await;
    let cooldown_entries = state.scanner.cache().len().await;

    Json(StatusResponse {
        scans_completed: stats.scans_completed,
        scans_failed: stats.scans_failed,
        positions_opened: stats.positions_opened,
        open_positions,
        cooldown_entries,
        last_scan_at: stats.last_scan_at.map(|t| t.to_rfc3339()),
        last_report: stats.last_report,
        last_error: stats.last_error,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

pub async fn get_positions(State(state): State<AppState>) -> Json<Vec<MonitorSnapshot>> {
    Json(state.scanner.registry().snapshots().await)
}

pub async fn get_cooldowns(State(state): State<AppState>) -> Json<Vec<CooldownEntry>> {
    let cache = state.scanner.cache();
    let window = cache.window();
    let now = Utc::now();

    let entries = cache
        .entries()
        .await
        .into_iter()
        .map(|(pool_name, at)| CooldownEntry {
            pool_name,
            last_entry: at.to_rfc3339(),
            remaining_secs: (window - (now - at)).num_seconds().max(0),
        })
        .collect();

    Json(entries)
}

pub async fn cancel_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, StatusCode> {
    if state.scanner.registry().cancel(id).await {
        Ok(Json(CancelResponse { id, cancelled: true }))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
