//! vip-db
//!
//! Postgres-backed entitlement store. Runtime `sqlx::query` + binds only (no
//! compile-time checked macros), so the crate builds without a live database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use vip_reconcile::{EntitlementRecord, EntitlementStore, PortError};

pub const ENV_DB_URL: &str = "VIP_DATABASE_URL";

/// Connect to Postgres using VIP_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='vip_entitlements'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_entitlements_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_entitlements_table: bool,
}

pub async fn fetch_entitlement(pool: &PgPool, member_id: &str) -> Result<Option<EntitlementRecord>> {
    let row = sqlx::query(
        r#"
        select member_id, vip_until_ms, trial_until_ms
        from vip_entitlements
        where member_id = $1
        "#,
    )
    .bind(member_id)
    .fetch_optional(pool)
    .await
    .context("fetch_entitlement failed")?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// Insert or overwrite a member's record (last write wins).
pub async fn upsert_entitlement(pool: &PgPool, record: &EntitlementRecord) -> Result<()> {
    sqlx::query(
        r#"
        insert into vip_entitlements (member_id, vip_until_ms, trial_until_ms, updated_at_utc)
        values ($1, $2, $3, now())
        on conflict (member_id) do update
          set vip_until_ms = excluded.vip_until_ms,
              trial_until_ms = excluded.trial_until_ms,
              updated_at_utc = now()
        "#,
    )
    .bind(&record.member_id)
    .bind(record.vip_until_ms)
    .bind(record.trial_until_ms)
    .execute(pool)
    .await
    .with_context(|| format!("upsert_entitlement failed for {}", record.member_id))?;
    Ok(())
}

/// All records, ordered by member id.
pub async fn list_entitlements(pool: &PgPool) -> Result<Vec<EntitlementRecord>> {
    let rows = sqlx::query(
        r#"
        select member_id, vip_until_ms, trial_until_ms
        from vip_entitlements
        order by member_id asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_entitlements failed")?;

    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<EntitlementRecord> {
    Ok(EntitlementRecord {
        member_id: row.try_get("member_id")?,
        vip_until_ms: row.try_get("vip_until_ms")?,
        trial_until_ms: row.try_get("trial_until_ms")?,
    })
}

// ---------------------------------------------------------------------------
// EntitlementStore
// ---------------------------------------------------------------------------

/// [`EntitlementStore`] over a shared pool.
#[derive(Clone, Debug)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn transport(e: anyhow::Error) -> PortError {
    PortError::Transport(format!("{e:#}"))
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn get(&self, member_id: &str) -> Result<Option<EntitlementRecord>, PortError> {
        fetch_entitlement(&self.pool, member_id)
            .await
            .map_err(transport)
    }

    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), PortError> {
        upsert_entitlement(&self.pool, record)
            .await
            .map_err(transport)
    }

    async fn list_all(&self) -> Result<Vec<EntitlementRecord>, PortError> {
        let records = list_entitlements(&self.pool).await.map_err(transport)?;
        tracing::debug!(count = records.len(), "entitlement snapshot loaded");
        Ok(records)
    }
}
