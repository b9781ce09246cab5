//! Request and response types for all vip-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};
use vip_reconcile::{SyncSummary, TrialChange, VipStatus};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// True while a reconciliation pass holds the guard.
    pub sync_running: bool,
}

// ---------------------------------------------------------------------------
// /v1/vip/form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormLinkResponse {
    pub url: String,
}

// ---------------------------------------------------------------------------
// /v1/vip/status/{member_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub member_id: String,
    pub status: VipStatus,
    /// Human-readable reply, e.g. "Your VIP is active until ...".
    pub message: String,
}

// ---------------------------------------------------------------------------
// /v1/vip/sync  /v1/vip/last-sync
// ---------------------------------------------------------------------------

/// `result` is one of "success" | "skipped" | "error".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub result: String,
    pub summary: Option<SyncSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastSyncResponse {
    pub summary: Option<SyncSummary>,
}

// ---------------------------------------------------------------------------
// /v1/members/join
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub member_id: String,
    /// Platform join time; the daemon's clock is used when absent.
    #[serde(default)]
    pub joined_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub member_id: String,
    pub change: TrialChange,
    pub status: VipStatus,
    pub role_granted: bool,
    pub role_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
