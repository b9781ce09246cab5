//! Read-only status projection.
//!
//! Runs without the sync guard. It may observe a record mid-pass; the next
//! pass corrects anything stale.

use std::fmt;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::{EntitlementStore, PortError};
use crate::{Entitlement, EntitlementRecord};

/// What a member is told when they ask for their VIP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VipStatus {
    NoVip,
    Lifetime,
    Active { until_ms: i64 },
    Expired { at_ms: i64 },
}

/// Classify a stored record (or its absence) at `now_ms`.
pub fn classify(record: Option<&EntitlementRecord>, now_ms: i64) -> VipStatus {
    let Some(record) = record else {
        return VipStatus::NoVip;
    };
    match record.entitlement() {
        Entitlement::None => VipStatus::NoVip,
        Entitlement::Lifetime => VipStatus::Lifetime,
        Entitlement::Expiring(ts) if ts > now_ms => VipStatus::Active { until_ms: ts },
        Entitlement::Expiring(ts) => VipStatus::Expired { at_ms: ts },
    }
}

/// Fetch and classify one member's record.
pub async fn query_status(
    store: &dyn EntitlementStore,
    member_id: &str,
    now_ms: i64,
) -> Result<VipStatus, PortError> {
    let record = store.get(member_id).await?;
    Ok(classify(record.as_ref(), now_ms))
}

impl fmt::Display for VipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VipStatus::NoVip => write!(f, "You do not have VIP."),
            VipStatus::Lifetime => write!(f, "You have lifetime VIP."),
            VipStatus::Active { until_ms } => {
                write!(f, "Your VIP is active until {}.", fmt_ms(*until_ms))
            }
            VipStatus::Expired { at_ms } => {
                write!(f, "Your VIP expired on {}.", fmt_ms(*at_ms))
            }
        }
    }
}

fn fmt_ms(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => format!("{ms}ms"),
    }
}
