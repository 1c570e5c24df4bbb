//! Per-run outcome aggregation.
//!
//! A [`RunRecord`] accumulates one [`SourceOutcome`] per processed source
//! page, in processing order. It lives only for the duration of one batch
//! invocation; the report renderer consumes it and nothing else persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DocumentStatus, UpsertOutcome};

/// Outcome of one selected URL's detection attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// The selected URL
    pub url: String,

    /// Why the selector picked this URL
    pub rationale: String,

    /// Detection result or failure description
    pub result: SelectionResult,
}

/// Either a recorded detection or the failure that replaced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionResult {
    Recorded {
        changed: bool,
        status: DocumentStatus,
        remote_modified: Option<DateTime<Utc>>,
    },
    Failed {
        error: String,
    },
}

/// Accumulated statistics for one source page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source_name: String,
    pub source_url: String,
    pub candidates_found: usize,
    pub candidates_selected: usize,
    pub selection_rationale: String,
    pub selections: Vec<SelectionOutcome>,
    pub added: usize,
    pub updated: usize,
    pub errors: usize,
}

impl SourceOutcome {
    /// Start an outcome for a source page.
    pub fn new(source_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            source_url: source_url.into(),
            ..Self::default()
        }
    }

    /// Record a successful detection.
    ///
    /// Counters follow the store outcome, not the detector's changed flag,
    /// so replaying an identical detection cannot double-count.
    pub fn record(
        &mut self,
        url: impl Into<String>,
        rationale: impl Into<String>,
        changed: bool,
        status: DocumentStatus,
        remote_modified: Option<DateTime<Utc>>,
        upsert: UpsertOutcome,
    ) {
        self.selections.push(SelectionOutcome {
            url: url.into(),
            rationale: rationale.into(),
            result: SelectionResult::Recorded {
                changed,
                status,
                remote_modified,
            },
        });

        match upsert {
            UpsertOutcome::Inserted => self.added += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }

    /// Record a fetch failure for a selected URL.
    pub fn record_failure(
        &mut self,
        url: impl Into<String>,
        rationale: impl Into<String>,
        error: impl Into<String>,
    ) {
        self.selections.push(SelectionOutcome {
            url: url.into(),
            rationale: rationale.into(),
            result: SelectionResult::Failed {
                error: error.into(),
            },
        });
        self.errors += 1;
    }

    /// Record a resolver or selector failure for the whole source.
    pub fn record_source_failure(&mut self, description: impl Into<String>) {
        self.selection_rationale = description.into();
        self.errors += 1;
    }
}

/// Aggregate of one batch invocation, ordered by source processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run began
    pub started_at: DateTime<Utc>,

    /// When the run finished; None while the run is still in flight
    pub finished_at: Option<DateTime<Utc>>,

    /// The source-list file this run (and its report) is keyed by
    pub source_list: String,

    /// One entry per processed source, in processing order
    pub sources: Vec<SourceOutcome>,
}

impl RunRecord {
    /// Begin a run record for the given source-list file.
    pub fn new(source_list: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            source_list: source_list.into(),
            sources: Vec::new(),
        }
    }

    /// Append a completed source outcome.
    pub fn push_source(&mut self, outcome: SourceOutcome) {
        self.sources.push(outcome);
    }

    /// Mark the run finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_added(&self) -> usize {
        self.sources.iter().map(|s| s.added).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.sources.iter().map(|s| s.updated).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.sources.iter().map(|s| s.errors).sum()
    }

    /// Check if any source recorded an error.
    pub fn has_errors(&self) -> bool {
        self.total_errors() > 0
    }
}
