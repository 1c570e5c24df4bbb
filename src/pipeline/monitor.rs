// src/pipeline/monitor.rs

//! Batch monitoring pipeline.
//!
//! Walks a source list: per source, discover candidates, select the ones
//! worth tracking, detect content changes for each selection, and apply
//! the outcomes to the document store. One source's failure never aborts
//! the others; a store failure aborts the run.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{Config, RunRecord, Source, SourceOutcome};
use crate::services::{
    CandidateResolver, ChangeDetector, Detection, DocumentSelector, SelectedDocument,
};
use crate::storage::{Observation, SqliteStore};
use crate::utils::document_name;

/// Run change detection over every source in the list.
///
/// Sources are processed in list order; the returned record preserves that
/// order for the report.
pub async fn run_monitor(
    config: &Config,
    source_list: &str,
    sources: &[Source],
    store: &SqliteStore,
    resolver: &dyn CandidateResolver,
    selector: &dyn DocumentSelector,
    detector: &ChangeDetector,
) -> Result<RunRecord> {
    let mut record = RunRecord::new(source_list);
    log::info!("Monitoring {} sources from {}", sources.len(), source_list);

    for source in sources {
        let outcome = process_source(config, source, store, resolver, selector, detector).await?;
        log::info!(
            "{}: {} found, {} selected, {} added, {} updated, {} errors",
            source.name,
            outcome.candidates_found,
            outcome.candidates_selected,
            outcome.added,
            outcome.updated,
            outcome.errors
        );
        record.push_source(outcome);
    }

    record.finish();
    Ok(record)
}

/// Process one source page into a completed outcome.
async fn process_source(
    config: &Config,
    source: &Source,
    store: &SqliteStore,
    resolver: &dyn CandidateResolver,
    selector: &dyn DocumentSelector,
    detector: &ChangeDetector,
) -> Result<SourceOutcome> {
    let mut outcome = SourceOutcome::new(&source.name, &source.url);

    let candidates = match resolver.resolve(&source.url).await {
        Ok(candidates) => candidates,
        Err(error) => {
            log::warn!("Resolving {} ({}) failed: {}", source.name, source.url, error);
            outcome.record_source_failure(format!("Candidate discovery failed: {error}"));
            return Ok(outcome);
        }
    };
    outcome.candidates_found = candidates.len();

    let selection = match selector.select(&source.name, &candidates).await {
        Ok(selection) => selection,
        Err(error) => {
            log::warn!("Selection for {} failed: {}", source.name, error);
            outcome.record_source_failure(format!("Selection failed: {error}"));
            return Ok(outcome);
        }
    };
    outcome.candidates_selected = selection.selected.len();
    outcome.selection_rationale = selection.overall_rationale.clone();

    let link_texts: HashMap<&str, &str> = candidates
        .iter()
        .map(|c| (c.url.as_str(), c.link_text.as_str()))
        .collect();

    let delay = Duration::from_millis(config.fetch.request_delay_ms);
    let concurrency = config.fetch.max_concurrent.max(1);

    // Detections fan out bounded by concurrency; `buffered` keeps outcomes
    // in selection order so the store sees them deterministically.
    let mut detections = stream::iter(selection.selected.iter())
        .map(|sel| {
            let store = store.clone();
            async move {
                let prior = store.find_by_url(&sel.url)?;
                let result = detector.detect(&sel.url, prior.as_ref()).await;
                Ok::<_, AppError>((sel, result))
            }
        })
        .buffered(concurrency);

    let mut recorded: Vec<String> = Vec::new();
    while let Some(item) = detections.next().await {
        let (sel, result) = item?;
        match result {
            Ok(detection) => {
                let link_text = link_texts.get(sel.url.as_str()).copied().unwrap_or("");
                apply_detection(store, &source.name, sel, link_text, &detection, &mut outcome)?;
                recorded.push(sel.url.clone());
            }
            Err(error) => {
                log::warn!("Detection for {} failed: {}", sel.url, error);
                outcome.record_failure(&sel.url, &sel.rationale, error.to_string());
            }
        }

        if delay.as_millis() > 0 {
            tokio::time::sleep(delay).await;
        }
    }

    let obsoleted = apply_supersession(store, &source.name, &recorded)?;
    for url in &obsoleted {
        log::info!("Superseded for {}: {}", source.name, url);
    }

    Ok(outcome)
}

/// Apply one successful detection to the store and the run outcome.
fn apply_detection(
    store: &SqliteStore,
    source_name: &str,
    sel: &SelectedDocument,
    link_text: &str,
    detection: &Detection,
    outcome: &mut SourceOutcome,
) -> Result<()> {
    let name = document_name(&sel.url);
    let observation = Observation {
        source_name,
        url: &sel.url,
        document_name: &name,
        link_text,
        fingerprint: &detection.fingerprint,
        checked_at: Utc::now(),
        content_updated_at: detection.remote_modified,
    };

    let (row, upsert) = store.upsert(&observation)?;
    outcome.record(
        &sel.url,
        &sel.rationale,
        detection.changed,
        row.status,
        row.content_updated_at,
        upsert,
    );
    Ok(())
}

/// Mark previously active rows the run no longer selects as obsolete.
///
/// Applies only when at least one selection for the source was recorded
/// this run; a run that recorded nothing leaves the prior rows active.
fn apply_supersession(
    store: &SqliteStore,
    source_name: &str,
    recorded: &[String],
) -> Result<Vec<String>> {
    if recorded.is_empty() {
        return Ok(Vec::new());
    }

    let mut obsoleted = Vec::new();
    for row in store.active_for_source(source_name)? {
        if recorded.iter().any(|url| *url == row.url) {
            continue;
        }
        if store.mark_obsolete(&row.url)? {
            obsoleted.push(row.url);
        }
    }
    Ok(obsoleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Client;

    use crate::models::DocumentStatus;
    use crate::services::{Candidate, Fingerprinter, Selection};

    const V1: &str = "https://acme.example/tariff-v1.pdf";
    const V2: &str = "https://acme.example/tariff-v2.pdf";

    fn detection(fingerprint: &str, changed: bool) -> Detection {
        Detection {
            fingerprint: fingerprint.to_string(),
            remote_modified: None,
            changed,
            probed: false,
        }
    }

    fn selected(url: &str) -> SelectedDocument {
        SelectedDocument {
            url: url.to_string(),
            rationale: "matched keywords: tariff".to_string(),
        }
    }

    fn acme_outcome() -> SourceOutcome {
        SourceOutcome::new("Acme Electric", "https://acme.example/rates")
    }

    #[test]
    fn test_first_detection_inserts_and_counts_added() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut outcome = acme_outcome();

        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "Commercial Tariff",
            &detection("h1", true),
            &mut outcome,
        )
        .unwrap();

        let row = store.find_by_url(V1).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Active);
        assert_eq!(row.link_text, "Commercial Tariff");
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.updated, 0);
    }

    #[test]
    fn test_reobserving_identical_content_counts_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", true),
            &mut first,
        )
        .unwrap();

        let mut second = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", false),
            &mut second,
        )
        .unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.selections.len(), 1);
    }

    #[test]
    fn test_supersession_marks_unselected_rows_obsolete() {
        // v1 is on record; a later run records v2 for the same source.
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", true),
            &mut first,
        )
        .unwrap();

        let mut second = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V2),
            "",
            &detection("h2", true),
            &mut second,
        )
        .unwrap();
        let obsoleted =
            apply_supersession(&store, "Acme Electric", &[V2.to_string()]).unwrap();

        assert_eq!(obsoleted, vec![V1.to_string()]);
        let old = store.find_by_url(V1).unwrap().unwrap();
        let new = store.find_by_url(V2).unwrap().unwrap();
        assert_eq!(old.status, DocumentStatus::Obsolete);
        assert_eq!(new.status, DocumentStatus::Active);
        assert_eq!(second.added, 1);
    }

    #[test]
    fn test_no_supersession_when_nothing_was_recorded() {
        // The replacement fetch failed: the prior row must stay active.
        let store = SqliteStore::open_in_memory().unwrap();
        let mut outcome = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", true),
            &mut outcome,
        )
        .unwrap();

        let obsoleted = apply_supersession(&store, "Acme Electric", &[]).unwrap();

        assert!(obsoleted.is_empty());
        let row = store.find_by_url(V1).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Active);
    }

    #[test]
    fn test_reselected_rows_stay_active() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut outcome = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", true),
            &mut outcome,
        )
        .unwrap();

        let obsoleted =
            apply_supersession(&store, "Acme Electric", &[V1.to_string()]).unwrap();

        assert!(obsoleted.is_empty());
        let row = store.find_by_url(V1).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Active);
    }

    #[test]
    fn test_supersession_scoped_to_source() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut acme = acme_outcome();
        apply_detection(
            &store,
            "Acme Electric",
            &selected(V1),
            "",
            &detection("h1", true),
            &mut acme,
        )
        .unwrap();
        let mut borealis =
            SourceOutcome::new("Borealis Power", "https://borealis.example/tariffs");
        let borealis_url = "https://borealis.example/rates.pdf";
        apply_detection(
            &store,
            "Borealis Power",
            &selected(borealis_url),
            "",
            &detection("h3", true),
            &mut borealis,
        )
        .unwrap();

        // Borealis's run must not touch Acme's rows.
        apply_supersession(&store, "Borealis Power", &[borealis_url.to_string()]).unwrap();

        let row = store.find_by_url(V1).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Active);
    }

    struct FailingResolver;

    #[async_trait]
    impl CandidateResolver for FailingResolver {
        async fn resolve(&self, _source_url: &str) -> Result<Vec<Candidate>> {
            Err(AppError::config("page unreachable"))
        }
    }

    struct NoneSelector;

    #[async_trait]
    impl DocumentSelector for NoneSelector {
        async fn select(&self, _source_name: &str, _candidates: &[Candidate]) -> Result<Selection> {
            Ok(Selection::default())
        }
    }

    #[tokio::test]
    async fn test_resolver_failure_is_recorded_and_run_continues() {
        let config = Config::default();
        let store = SqliteStore::open_in_memory().unwrap();
        let detector =
            ChangeDetector::new(Fingerprinter::new(Client::new(), &config.fetch), false);
        let sources = vec![
            Source {
                name: "Acme Electric".to_string(),
                url: "https://acme.example/rates".to_string(),
            },
            Source {
                name: "Borealis Power".to_string(),
                url: "https://borealis.example/tariffs".to_string(),
            },
        ];

        let record = run_monitor(
            &config,
            "sources.toml",
            &sources,
            &store,
            &FailingResolver,
            &NoneSelector,
            &detector,
        )
        .await
        .unwrap();

        assert_eq!(record.sources.len(), 2);
        assert!(record.sources.iter().all(|s| s.errors == 1));
        assert_eq!(record.total_added(), 0);
        assert!(record.finished_at.is_some());
    }

    struct StubResolver;

    #[async_trait]
    impl CandidateResolver for StubResolver {
        async fn resolve(&self, _source_url: &str) -> Result<Vec<Candidate>> {
            Ok(vec![Candidate {
                url: "https://acme.example/newsletter.pdf".to_string(),
                link_text: "Newsletter".to_string(),
                context: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn test_source_with_no_selection_records_counts_only() {
        let config = Config::default();
        let store = SqliteStore::open_in_memory().unwrap();
        let detector =
            ChangeDetector::new(Fingerprinter::new(Client::new(), &config.fetch), false);
        let sources = vec![Source {
            name: "Acme Electric".to_string(),
            url: "https://acme.example/rates".to_string(),
        }];

        let record = run_monitor(
            &config,
            "sources.toml",
            &sources,
            &store,
            &StubResolver,
            &NoneSelector,
            &detector,
        )
        .await
        .unwrap();

        let outcome = &record.sources[0];
        assert_eq!(outcome.candidates_found, 1);
        assert_eq!(outcome.candidates_selected, 0);
        assert_eq!(outcome.errors, 0);
        assert!(outcome.selections.is_empty());
    }
}
