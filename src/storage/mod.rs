//! Persistent document store.
//!
//! One table, one row per tracked URL. History is kept by flipping rows to
//! `OBSOLETE`, never by deleting them.

pub mod sqlite;

use chrono::{DateTime, Utc};

// Re-export for convenience
pub use sqlite::SqliteStore;

/// One successful detection, ready to be applied to the store.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    /// Owning utility/source
    pub source_name: &'a str,

    /// Cleaned document URL, the row's natural key
    pub url: &'a str,

    /// Display label for the document
    pub document_name: &'a str,

    /// Text the URL was discovered under
    pub link_text: &'a str,

    /// Fingerprint the detection settled on
    pub fingerprint: &'a str,

    /// When the detection ran
    pub checked_at: DateTime<Utc>,

    /// Remote modification timestamp, when the server reported one
    pub content_updated_at: Option<DateTime<Utc>>,
}
