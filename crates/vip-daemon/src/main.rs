//! vip-daemon entry point.
//!
//! Thin: sets up tracing, loads config, connects the store, wires the engine
//! and starts the HTTP server plus the sync schedule. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use vip_daemon::{config::DaemonConfig, discord::DiscordPlatform, routes, sheet::SheetRoster, state};
use vip_db::PgEntitlementStore;
use vip_reconcile::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = DaemonConfig::from_env().context("daemon config")?;
    info!(?cfg, "vip-daemon config loaded");

    let pool = vip_db::connect_from_env().await?;
    vip_db::migrate(&pool).await?;
    let db = vip_db::status(&pool).await?;
    if !db.has_entitlements_table {
        warn!("vip_entitlements table missing after migrate");
    }

    let platform = DiscordPlatform::new(cfg.discord.clone()).context("discord client")?;
    let roster = SheetRoster::new(cfg.roster_url.clone()).context("roster client")?;
    let engine = Reconciler::new(
        Arc::new(PgEntitlementStore::new(pool)),
        Arc::new(platform),
        Arc::new(roster),
        cfg.engine_config(),
    );

    let shared = Arc::new(state::AppState::new(engine, cfg.form_url.clone()));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    let schedule = state::spawn_sync_schedule(Arc::clone(&shared), cfg.sync_interval);

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    info!("vip-daemon listening on http://{}", cfg.bind_addr);

    axum::serve(tokio::net::TcpListener::bind(cfg.bind_addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    schedule.abort();
    info!("vip-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
