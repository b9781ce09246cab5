//! Daemon configuration from the process environment.
//!
//! `main.rs` loads `.env.local` first (dev convenience), then calls
//! [`DaemonConfig::from_env`]. The database URL is read separately by
//! `vip_db::connect_from_env`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use vip_reconcile::{EngineConfig, RosterColumns};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Upper bound for the sync interval and the pass timeout (one day).
pub const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;
/// Upper bound for per-phase in-flight member operations.
pub const MAX_MEMBER_CONCURRENCY: u64 = 64;

#[derive(Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub api_base: String,
    pub guild_id: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("guild_id", &self.guild_id)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    pub discord: DiscordConfig,
    pub role_id: String,
    pub roster_url: String,
    pub roster_columns: RosterColumns,
    /// Link handed out by `GET /v1/vip/form`.
    pub form_url: Option<String>,
    pub sync_interval: Duration,
    pub pass_timeout: Duration,
    pub member_concurrency: usize,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("missing env var {key}"));

        let bind_addr = match get("VIP_DAEMON_ADDR") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid VIP_DAEMON_ADDR: {v}"))?,
            None => SocketAddr::from(([127, 0, 0, 1], 8898)),
        };

        let defaults = RosterColumns::default();
        let roster_columns = RosterColumns {
            member_id: get("VIP_ROSTER_ID_COLUMN").unwrap_or(defaults.member_id),
            approval: get("VIP_ROSTER_APPROVAL_COLUMN").unwrap_or(defaults.approval),
        };

        Ok(Self {
            bind_addr,
            discord: DiscordConfig {
                token: require("VIP_DISCORD_TOKEN")?,
                api_base: get("VIP_DISCORD_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_string()),
                guild_id: require("VIP_GUILD_ID")?,
            },
            role_id: require("VIP_ROLE_ID")?,
            roster_url: require("VIP_ROSTER_URL")?,
            roster_columns,
            form_url: get("VIP_FORM_URL"),
            sync_interval: Duration::from_secs(parse_bounded(
                &get,
                "VIP_SYNC_INTERVAL_SECS",
                300,
                MAX_PERIOD_SECS,
            )?),
            pass_timeout: Duration::from_secs(parse_bounded(
                &get,
                "VIP_PASS_TIMEOUT_SECS",
                120,
                MAX_PERIOD_SECS,
            )?),
            member_concurrency: parse_bounded(
                &get,
                "VIP_MEMBER_CONCURRENCY",
                4,
                MAX_MEMBER_CONCURRENCY,
            )? as usize,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            role_id: self.role_id.clone(),
            roster_columns: self.roster_columns.clone(),
            member_concurrency: self.member_concurrency,
            pass_timeout: self.pass_timeout,
        }
    }
}

/// Parse `key` as an integer in `1..=max`, or `default` when unset.
fn parse_bounded<G>(get: &G, key: &str, default: u64, max: u64) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    let v: u64 = raw
        .parse()
        .with_context(|| format!("invalid {key}: {raw}"))?;
    if v == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    if v > max {
        return Err(anyhow!("{key} must be <= {max}, got {v}"));
    }
    Ok(v)
}
