//! Axum router and all HTTP handlers for vip-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests in `tests/` drive the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use vip_reconcile::SyncOutcome;

use crate::{
    api_types::{
        ErrorResponse, FormLinkResponse, HealthResponse, JoinRequest, JoinResponse,
        LastSyncResponse, StatusResponse, SyncResponse,
    },
    discord::is_snowflake,
    state::{run_sync, AppState, BusMsg, SyncTrigger},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs` attaches
/// them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/vip/form", get(form_link))
        .route("/v1/vip/status/:member_id", get(vip_status))
        .route("/v1/vip/sync", post(vip_sync))
        .route("/v1/vip/last-sync", get(last_sync))
        .route("/v1/members/join", post(member_join))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            sync_running: st.engine.guard().is_running(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/vip/form
// ---------------------------------------------------------------------------

pub(crate) async fn form_link(State(st): State<Arc<AppState>>) -> Response {
    match &st.form_url {
        Some(url) => (StatusCode::OK, Json(FormLinkResponse { url: url.clone() })).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no application form configured"),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/vip/status/:member_id
// ---------------------------------------------------------------------------

pub(crate) async fn vip_status(
    State(st): State<Arc<AppState>>,
    Path(member_id): Path<String>,
) -> Response {
    match st.engine.status(&member_id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                message: status.to_string(),
                member_id,
                status,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(member_id, error = %e, "status lookup failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/vip/sync
// ---------------------------------------------------------------------------

/// Manual trigger. `409 Conflict` when a pass is already running.
pub(crate) async fn vip_sync(State(st): State<Arc<AppState>>) -> Response {
    match run_sync(&st, SyncTrigger::Manual).await {
        Ok(SyncOutcome::Completed(summary)) => (
            StatusCode::OK,
            Json(SyncResponse {
                result: "success".to_string(),
                summary: Some(summary),
                error: None,
            }),
        )
            .into_response(),
        Ok(SyncOutcome::Skipped) => (
            StatusCode::CONFLICT,
            Json(SyncResponse {
                result: "skipped".to_string(),
                summary: None,
                error: Some("a sync pass is already running".to_string()),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SyncResponse {
                result: "error".to_string(),
                summary: None,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/vip/last-sync
// ---------------------------------------------------------------------------

pub(crate) async fn last_sync(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = st.last_sync.read().await.clone();
    (StatusCode::OK, Json(LastSyncResponse { summary }))
}

// ---------------------------------------------------------------------------
// POST /v1/members/join
// ---------------------------------------------------------------------------

pub(crate) async fn member_join(
    State(st): State<Arc<AppState>>,
    Json(req): Json<JoinRequest>,
) -> Response {
    let member_id = req.member_id.trim().to_string();
    if member_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "member_id must not be empty");
    }
    if !is_snowflake(&member_id) {
        return error_response(StatusCode::BAD_REQUEST, "member_id must be a numeric id");
    }

    match st
        .engine
        .handle_member_join(&member_id, req.joined_at_ms)
        .await
    {
        Ok(outcome) => {
            info!(member_id, change = ?outcome.change, "members/join");
            let _ = st.bus.send(BusMsg::LogLine {
                level: "INFO".to_string(),
                msg: format!("member {member_id} joined: trial {:?}", outcome.change),
            });
            (
                StatusCode::OK,
                Json(JoinResponse {
                    member_id,
                    change: outcome.change,
                    status: outcome.status,
                    role_granted: outcome.role_granted,
                    role_error: outcome.role_error,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(member_id, error = %e, "join trial could not be saved");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::SyncCompleted(_) => "sync_completed",
                    BusMsg::SyncFailed { .. } => "sync_failed",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
