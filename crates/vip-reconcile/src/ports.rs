//! Collaborator boundaries the engine depends on.
//!
//! Only the traits and their error type live here. Concrete Postgres, Discord
//! and spreadsheet implementations live in `vip-db` and `vip-daemon`; the
//! in-memory doubles live in `vip-testkit`.
//!
//! All traits are object safe and `Send + Sync` so the engine can hold them
//! as `Arc<dyn ...>` across task boundaries.

use std::fmt;

use async_trait::async_trait;

use crate::{EntitlementRecord, PlatformMember};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a collaborator may return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortError {
    /// Network, database or other transport failure.
    Transport(String),
    /// The remote side refused the operation (e.g. role change forbidden).
    Rejected { status: Option<u16>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::Transport(msg) => write!(f, "transport error: {msg}"),
            PortError::Rejected {
                status: Some(s),
                message,
            } => write!(f, "rejected status={s}: {message}"),
            PortError::Rejected {
                status: None,
                message,
            } => write!(f, "rejected: {message}"),
            PortError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for PortError {}

// ---------------------------------------------------------------------------
// Entitlement store
// ---------------------------------------------------------------------------

/// Durable `member_id → EntitlementRecord` mapping.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn get(&self, member_id: &str) -> Result<Option<EntitlementRecord>, PortError>;

    /// Insert or replace the record keyed by `record.member_id`.
    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), PortError>;

    /// Snapshot of every stored record.
    async fn list_all(&self) -> Result<Vec<EntitlementRecord>, PortError>;
}

// ---------------------------------------------------------------------------
// Member platform
// ---------------------------------------------------------------------------

/// The chat platform, scoped to one community.
#[async_trait]
pub trait MemberPlatform: Send + Sync {
    async fn role_exists(&self, role_id: &str) -> Result<bool, PortError>;

    /// Look up a single member. A member who is not in the community is
    /// `Ok(None)`, never an error.
    async fn fetch_member(&self, member_id: &str) -> Result<Option<PlatformMember>, PortError>;

    async fn add_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError>;

    async fn remove_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError>;
}

// ---------------------------------------------------------------------------
// Roster source
// ---------------------------------------------------------------------------

/// The external approval roster. First row is the header.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PortError>;
}
