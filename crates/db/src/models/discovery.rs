//! Models for the discovery registries.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tome_core::types::{DbId, Timestamp};

// ── Moderation decision ──────────────────────────────────────────────

/// Moderation state of a classification code.
///
/// Codes start `pending`; only the moderation surface moves them to
/// `allowed` or `blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pending,
    Allowed,
    Blocked,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
        }
    }

    /// Parse a decision string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "allowed" => Some(Self::Allowed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// All valid decision values.
    pub const ALL: &'static [&'static str] = &["pending", "allowed", "blocked"];
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

/// A row from one of the discovery registry tables. Registry-specific
/// extra columns (item category, consumable effect kind) are not part of
/// the shared row shape.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiscoveryRow {
    pub id: DbId,
    pub classification_code: i64,
    pub decision: String,
    pub seen_count: i64,
    pub last_seen_at: Option<Timestamp>,
    pub name: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ── Batch summaries ──────────────────────────────────────────────────

/// Result of one `touch_many` call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TouchSummary {
    /// Distinct positive codes in the request.
    pub requested: u64,
    /// Placeholder rows newly inserted (absent before the call).
    pub inserted: u64,
    /// Rows whose counters were bumped (new and pre-existing).
    pub updated: u64,
}

/// One failed item of a bulk decision update.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionError {
    pub classification_code: i64,
    pub error: String,
}

/// Result of a bulk decision update; one item's failure never aborts the
/// batch.
#[derive(Debug, Clone, Serialize)]
pub struct BulkDecisionOutcome {
    pub requested: usize,
    pub updated: usize,
    pub errors: Vec<DecisionError>,
}
