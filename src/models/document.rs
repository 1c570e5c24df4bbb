//! Tracked document row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked document.
///
/// A document stays `Active` while it is the current canonical document for
/// its source. It becomes `Obsolete` when a later run records a different
/// URL for the same source; the row itself is never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "OBSOLETE")]
    Obsolete,
}

impl DocumentStatus {
    /// Persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "ACTIVE",
            DocumentStatus::Obsolete => "OBSOLETE",
        }
    }

    /// Parse the persisted representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(DocumentStatus::Active),
            "OBSOLETE" => Some(DocumentStatus::Obsolete),
            _ => None,
        }
    }
}

/// One row per known URL.
///
/// `url` is the natural key: re-observing the same URL always updates the
/// same row rather than inserting a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedDocument {
    /// Row id, assigned on first insert, immutable
    pub id: i64,

    /// Owning utility/source this document belongs to
    pub source_name: String,

    /// Resource locator; unique key for change detection
    pub url: String,

    /// Human-readable label, usually the file name. Advisory only.
    pub document_name: String,

    /// Last-known content fingerprint (hex SHA-256).
    /// None only before the first successful fetch.
    pub fingerprint: Option<String>,

    /// Timestamp of the most recent detection attempt
    pub last_checked: DateTime<Utc>,

    /// Best-effort timestamp of the last content change, from remote
    /// metadata when available
    pub content_updated_at: Option<DateTime<Utc>>,

    /// Lifecycle status
    pub status: DocumentStatus,

    /// Text under which the URL was discovered. Advisory only.
    pub link_text: String,
}

/// What applying an observation did to the row for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// URL was unknown; a new `ACTIVE` row was inserted
    Inserted,
    /// Row existed and the stored fingerprint differed
    Updated,
    /// Row existed with an identical fingerprint; only `last_checked` moved
    Unchanged,
}
