//! SQLite-backed document store.
//!
//! A single connection behind a mutex serializes writes; each upsert runs
//! in its own transaction so a row is never left half-applied.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{AppError, Result};
use crate::models::{DocumentStatus, TrackedDocument, UpsertOutcome};

use super::Observation;

/// Schema creation SQL, idempotent.
///
/// `url` carries a unique index: at most one row per URL, enforced even
/// under concurrent runs.
const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS tariff_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    utility_name TEXT NOT NULL,
    url TEXT NOT NULL,
    document_name TEXT,
    hash TEXT,
    last_checked TEXT NOT NULL,
    tariff_last_updated TEXT,
    status TEXT NOT NULL,
    link_text TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tariff_documents_url
    ON tariff_documents(url);
CREATE INDEX IF NOT EXISTS idx_tariff_documents_utility
    ON tariff_documents(utility_name, status);
"#;

/// Document store over a single SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a store at the given path.
    ///
    /// With `initialize` the schema is created if absent; without it, a
    /// missing table is an error rather than an empty store.
    pub fn open(path: impl AsRef<Path>, initialize: bool) -> Result<Self> {
        if initialize {
            if let Some(parent) = path.as_ref().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let conn = Connection::open(&path)?;
        if initialize {
            conn.execute_batch(SCHEMA_SQL)?;
        } else if !table_exists(&conn)? {
            return Err(AppError::config(format!(
                "Database at {:?} is not initialized. Run the init command or pass --init.",
                path.as_ref()
            )));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply one detection to the row for its URL.
    ///
    /// Unknown URL: insert as `ACTIVE`. Known URL: update `hash`,
    /// `last_checked` and `tariff_last_updated` in place, preserving id and
    /// status; an identical fingerprint only moves `last_checked`.
    /// Idempotent under retry.
    pub fn upsert(&self, obs: &Observation<'_>) -> Result<(TrackedDocument, UpsertOutcome)> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction()?;

        let existing = find_in(&tx, obs.url)?;
        let outcome = match &existing {
            Some(doc) if doc.fingerprint.as_deref() == Some(obs.fingerprint) => {
                tx.execute(
                    "UPDATE tariff_documents SET last_checked = ?1 WHERE id = ?2",
                    params![obs.checked_at.to_rfc3339(), doc.id],
                )?;
                UpsertOutcome::Unchanged
            }
            Some(doc) => {
                let content_updated = obs.content_updated_at.unwrap_or(obs.checked_at);
                tx.execute(
                    r#"
                    UPDATE tariff_documents
                    SET hash = ?1, last_checked = ?2, tariff_last_updated = ?3
                    WHERE id = ?4
                    "#,
                    params![
                        obs.fingerprint,
                        obs.checked_at.to_rfc3339(),
                        content_updated.to_rfc3339(),
                        doc.id
                    ],
                )?;
                UpsertOutcome::Updated
            }
            None => {
                let content_updated = obs.content_updated_at.unwrap_or(obs.checked_at);
                tx.execute(
                    r#"
                    INSERT INTO tariff_documents
                        (utility_name, url, document_name, hash, last_checked,
                         tariff_last_updated, status, link_text)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'ACTIVE', ?7)
                    "#,
                    params![
                        obs.source_name,
                        obs.url,
                        obs.document_name,
                        obs.fingerprint,
                        obs.checked_at.to_rfc3339(),
                        content_updated.to_rfc3339(),
                        obs.link_text
                    ],
                )?;
                UpsertOutcome::Inserted
            }
        };

        let row = tx.query_row(
            "SELECT * FROM tariff_documents WHERE url = ?1",
            params![obs.url],
            row_to_document,
        )?;
        tx.commit()?;

        Ok((row, outcome))
    }

    /// Look up the row for a URL.
    pub fn find_by_url(&self, url: &str) -> Result<Option<TrackedDocument>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        find_in(&conn, url)
    }

    /// All `ACTIVE` rows for a source, in insertion order.
    pub fn active_for_source(&self, source_name: &str) -> Result<Vec<TrackedDocument>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM tariff_documents
            WHERE utility_name = ?1 AND status = 'ACTIVE'
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![source_name], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Flip a row to `OBSOLETE` without deleting its history.
    ///
    /// Returns whether a row was actually flipped.
    pub fn mark_obsolete(&self, url: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let changed = conn.execute(
            "UPDATE tariff_documents SET status = 'OBSOLETE' WHERE url = ?1",
            params![url],
        )?;
        Ok(changed > 0)
    }

    /// Number of rows in the given status.
    pub fn count_by_status(&self, status: DocumentStatus) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count = conn.query_row(
            "SELECT COUNT(*) FROM tariff_documents WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn table_exists(conn: &Connection) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'tariff_documents'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn find_in(conn: &Connection, url: &str) -> Result<Option<TrackedDocument>> {
    let doc = conn
        .query_row(
            "SELECT * FROM tariff_documents WHERE url = ?1",
            params![url],
            row_to_document,
        )
        .optional()?;
    Ok(doc)
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<TrackedDocument> {
    let status_text: String = row.get("status")?;
    let status = DocumentStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown status {status_text:?}").into(),
        )
    })?;

    Ok(TrackedDocument {
        id: row.get("id")?,
        source_name: row.get("utility_name")?,
        url: row.get("url")?,
        document_name: row.get::<_, Option<String>>("document_name")?.unwrap_or_default(),
        fingerprint: row.get("hash")?,
        last_checked: parse_timestamp(row, "last_checked")?,
        content_updated_at: {
            let raw: Option<String> = row.get("tariff_last_updated")?;
            match raw {
                Some(s) => Some(parse_rfc3339(&s)?),
                None => None,
            }
        },
        status,
        link_text: row.get::<_, Option<String>>("link_text")?.unwrap_or_default(),
    })
}

fn parse_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_rfc3339(&raw)
}

fn parse_rfc3339(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}
