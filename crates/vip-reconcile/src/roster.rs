//! Roster ingestion: raw spreadsheet rows → [`EligibilityMap`].
//!
//! ## Column contract (case-insensitive, trimmed, order-independent)
//!
//! | Column         | Example  | Notes                                  |
//! |----------------|----------|----------------------------------------|
//! | `discord_id`   | `123456` | Member identifier; empty rows skipped  |
//! | `lifetime_vip` | `YES`    | Only `YES` (any case) approves         |
//!
//! Both header names are configurable through [`RosterColumns`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Approval token matched case-insensitively against the approval column.
pub const APPROVAL_TOKEN: &str = "YES";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// The roster header is missing a required column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RosterSchemaError {
    MissingColumn(String),
}

impl fmt::Display for RosterSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterSchemaError::MissingColumn(col) => {
                write!(f, "roster missing required header column: '{col}'")
            }
        }
    }
}

impl std::error::Error for RosterSchemaError {}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Header names the ingestor looks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterColumns {
    pub member_id: String,
    pub approval: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            member_id: "discord_id".to_string(),
            approval: "lifetime_vip".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Eligibility map
// ---------------------------------------------------------------------------

/// Per-pass `member_id → approved for lifetime VIP` decision. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EligibilityMap {
    entries: BTreeMap<String, bool>,
}

impl EligibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins for duplicate identifiers.
    pub fn insert(&mut self, member_id: impl Into<String>, approved: bool) {
        self.entries.insert(member_id.into(), approved);
    }

    pub fn get(&self, member_id: &str) -> Option<bool> {
        self.entries.get(member_id).copied()
    }

    /// Absent and `approved=false` both read as not approved.
    pub fn is_approved(&self, member_id: &str) -> bool {
        self.get(member_id).unwrap_or(false)
    }

    pub fn approved_ids(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, approved)| **approved)
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the eligibility map from roster rows (first row = header).
///
/// An empty roster or a header-only roster yields an empty map. Only a
/// missing required column is an error.
pub fn parse_roster(
    rows: &[Vec<String>],
    columns: &RosterColumns,
) -> Result<EligibilityMap, RosterSchemaError> {
    let mut map = EligibilityMap::new();

    let Some((header, data)) = rows.split_first() else {
        return Ok(map);
    };

    let col_idx = build_col_index(header);
    let id_col = lookup(&col_idx, &columns.member_id)?;
    let approval_col = lookup(&col_idx, &columns.approval)?;

    for row in data {
        let member_id = row.get(id_col).map(|s| s.trim()).unwrap_or("");
        if member_id.is_empty() {
            continue;
        }
        let approved = row
            .get(approval_col)
            .map(|s| is_approval(s))
            .unwrap_or(false);
        map.insert(member_id, approved);
    }

    Ok(map)
}

/// `true` only for the approval token, ignoring case and surrounding space.
pub fn is_approval(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(APPROVAL_TOKEN)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lowercased, trimmed header name → index. First occurrence wins.
fn build_col_index(header: &[String]) -> HashMap<String, usize> {
    let mut idx = HashMap::new();
    for (i, name) in header.iter().enumerate() {
        idx.entry(name.trim().to_ascii_lowercase()).or_insert(i);
    }
    idx
}

fn lookup(col_idx: &HashMap<String, usize>, name: &str) -> Result<usize, RosterSchemaError> {
    col_idx
        .get(&name.trim().to_ascii_lowercase())
        .copied()
        .ok_or_else(|| RosterSchemaError::MissingColumn(name.to_string()))
}
