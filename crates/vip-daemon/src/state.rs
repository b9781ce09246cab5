//! Shared runtime state for vip-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Every sync trigger
//! (startup, timer, manual route) goes through [`run_sync`], which calls the
//! engine's guarded entry point and publishes the result.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use vip_reconcile::{Reconciler, SyncError, SyncOutcome, SyncSummary};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    SyncCompleted(SyncSummary),
    SyncFailed { trigger: SyncTrigger, error: String },
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Sync triggers
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    Timer,
    Manual,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Timer => "timer",
            SyncTrigger::Manual => "manual",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: Reconciler,
    /// Application form link served by `GET /v1/vip/form`.
    pub form_url: Option<String>,
    /// Summary of the most recent completed pass.
    pub last_sync: Arc<RwLock<Option<SyncSummary>>>,
}

impl AppState {
    pub fn new(engine: Reconciler, form_url: Option<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "vip-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine,
            form_url,
            last_sync: Arc::new(RwLock::new(None)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Run one guarded pass on behalf of `trigger`, record and broadcast it.
pub async fn run_sync(st: &AppState, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
    let result = st.engine.sync().await;
    match &result {
        Ok(SyncOutcome::Completed(summary)) => {
            info!(
                trigger = trigger.as_str(),
                pass_id = %summary.pass_id,
                transitions = summary.transitions(),
                failures = summary.failures.len(),
                "vip sync finished"
            );
            *st.last_sync.write().await = Some(summary.clone());
            let _ = st.bus.send(BusMsg::SyncCompleted(summary.clone()));
        }
        Ok(SyncOutcome::Skipped) => {
            info!(trigger = trigger.as_str(), "vip sync skipped: pass already running");
        }
        Err(e) => {
            error!(trigger = trigger.as_str(), error = %e, "vip sync failed");
            let _ = st.bus.send(BusMsg::SyncFailed {
                trigger,
                error: e.to_string(),
            });
        }
    }
    result
}

/// Spawn the scheduler: one pass immediately (startup), then one per
/// `interval`. Ticks missed while a pass runs are skipped, not replayed.
pub fn spawn_sync_schedule(st: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut trigger = SyncTrigger::Startup;
        loop {
            ticker.tick().await;
            // Failures are already logged and broadcast by run_sync.
            let _ = run_sync(&st, trigger).await;
            trigger = SyncTrigger::Timer;
        }
    })
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
