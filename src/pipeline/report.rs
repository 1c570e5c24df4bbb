// src/pipeline/report.rs

//! Run report rendering.
//!
//! Pure function from a completed run record to a Markdown document: a
//! summary table with one row per source, then one detail section per
//! source. Rendering never touches the store or mutates the record.

use crate::models::{RunRecord, SelectionResult, SourceOutcome};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Render a run record as a Markdown report.
///
/// `rationale_width` bounds the rationale column of the summary table; the
/// detail sections always carry the full text.
pub fn render_report(record: &RunRecord, rationale_width: usize) -> String {
    let mut out = String::new();

    out.push_str("# Tariff Document Monitor Report\n\n");
    out.push_str(&format!("Source list: `{}`\n\n", record.source_list));
    out.push_str(&format!(
        "Run started: {}\n",
        record.started_at.format(TIMESTAMP_FORMAT)
    ));
    if let Some(finished) = record.finished_at {
        out.push_str(&format!(
            "Run finished: {}\n",
            finished.format(TIMESTAMP_FORMAT)
        ));
    }
    out.push('\n');

    out.push_str("## Summary\n\n");
    out.push_str("| # | Source | Found | Selected | Rationale | Added | Updated | Errors |\n");
    out.push_str("|--:|---|--:|--:|---|--:|--:|--:|\n");
    for (i, source) in record.sources.iter().enumerate() {
        let ordinal = i + 1;
        out.push_str(&format!(
            "| {} | [{}](#{}) | {} | {} | {} | {} | {} | {} |\n",
            ordinal,
            table_cell(&source.source_name),
            anchor(ordinal, &source.source_name),
            source.candidates_found,
            source.candidates_selected,
            table_cell(&truncate(&source.selection_rationale, rationale_width)),
            source.added,
            source.updated,
            source.errors,
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "Totals: {} added, {} updated, {} errors.\n",
        record.total_added(),
        record.total_updated(),
        record.total_errors()
    ));

    for (i, source) in record.sources.iter().enumerate() {
        detail_section(&mut out, i + 1, source);
    }

    out
}

fn detail_section(out: &mut String, ordinal: usize, source: &SourceOutcome) {
    out.push_str(&format!("\n## {}. {}\n\n", ordinal, source.source_name));
    out.push_str(&format!("Source page: <{}>\n\n", source.source_url));
    if !source.selection_rationale.is_empty() {
        out.push_str(&format!("{}\n\n", source.selection_rationale));
    }

    if source.selections.is_empty() {
        out.push_str("No documents selected.\n");
        return;
    }

    for selection in &source.selections {
        out.push_str(&format!("- <{}>\n", selection.url));
        out.push_str(&format!("  - Rationale: {}\n", selection.rationale));
        match &selection.result {
            SelectionResult::Recorded {
                changed,
                status,
                remote_modified,
            } => {
                out.push_str(&format!(
                    "  - Changed: {}\n",
                    if *changed { "yes" } else { "no" }
                ));
                out.push_str(&format!("  - Status: {}\n", status.as_str()));
                match remote_modified {
                    Some(ts) => out.push_str(&format!(
                        "  - Remote modified: {}\n",
                        ts.format(TIMESTAMP_FORMAT)
                    )),
                    None => out.push_str("  - Remote modified: unknown\n"),
                }
            }
            SelectionResult::Failed { error } => {
                out.push_str(&format!("  - Error: {error}\n"));
            }
        }
    }
}

/// Fixed-length prefix with an ellipsis marker. Cosmetic only; the detail
/// section keeps the full text.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let prefix: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{prefix}…")
}

/// Anchor id matching the `## {ordinal}. {name}` detail heading.
fn anchor(ordinal: usize, name: &str) -> String {
    let slug: String = name
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect();
    format!("{ordinal}-{slug}")
}

/// Keep table cells on one line with literal pipes escaped.
fn table_cell(text: &str) -> String {
    text.replace('\n', " ").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentStatus, UpsertOutcome};

    fn sample_record() -> RunRecord {
        let mut record = RunRecord::new("sources.toml");

        let mut acme = SourceOutcome::new("Acme Electric", "https://acme.example/rates");
        acme.candidates_found = 12;
        acme.candidates_selected = 2;
        acme.selection_rationale =
            "Selected 2 of 12 candidates for Acme Electric by keyword score, preferring \
             commercial tariff schedules over unrelated board documents"
                .to_string();
        acme.record(
            "https://acme.example/tariff-v2.pdf",
            "matched keywords: tariff",
            true,
            DocumentStatus::Active,
            None,
            UpsertOutcome::Inserted,
        );
        acme.record_failure(
            "https://acme.example/rates.pdf",
            "matched keywords: rate",
            "Unexpected status 404 for https://acme.example/rates.pdf",
        );
        record.push_source(acme);

        let mut borealis = SourceOutcome::new("Borealis Power", "https://borealis.example/tariffs");
        borealis.record_source_failure("Candidate discovery failed: page unreachable");
        record.push_source(borealis);

        record.finish();
        record
    }

    #[test]
    fn test_summary_rows_link_to_detail_sections() {
        let report = render_report(&sample_record(), 60);

        assert!(report.contains("| 1 | [Acme Electric](#1-acme-electric) | 12 | 2 |"));
        assert!(report.contains("| 2 | [Borealis Power](#2-borealis-power) |"));
        assert!(report.contains("\n## 1. Acme Electric\n"));
        assert!(report.contains("\n## 2. Borealis Power\n"));
    }

    #[test]
    fn test_truncation_is_cosmetic_only() {
        let record = sample_record();
        let report = render_report(&record, 24);
        let full = &record.sources[0].selection_rationale;

        // The table carries the prefix with an ellipsis, the detail section
        // the full text.
        assert!(report.contains("| Selected 2 of 12 candid… |"));
        assert!(report.contains(full.as_str()));
    }

    #[test]
    fn test_detail_section_carries_selection_results() {
        let report = render_report(&sample_record(), 60);

        assert!(report.contains("- <https://acme.example/tariff-v2.pdf>"));
        assert!(report.contains("  - Changed: yes"));
        assert!(report.contains("  - Status: ACTIVE"));
        assert!(report.contains("  - Remote modified: unknown"));
        assert!(report.contains("  - Error: Unexpected status 404"));
    }

    #[test]
    fn test_counters_and_totals() {
        let report = render_report(&sample_record(), 60);

        // Acme: 1 added, 0 updated, 1 error. Borealis: 1 error.
        assert!(report.contains("| 1 | 0 | 1 |"));
        assert!(report.contains("Totals: 1 added, 0 updated, 2 errors."));
    }

    #[test]
    fn test_source_with_no_selections() {
        let report = render_report(&sample_record(), 60);
        assert!(report.contains("No documents selected."));
    }

    #[test]
    fn test_rendering_does_not_mutate_the_record() {
        let record = sample_record();
        let before = serde_json::to_string(&record).unwrap();
        let _ = render_report(&record, 60);
        assert_eq!(serde_json::to_string(&record).unwrap(), before);
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn test_table_cell_escapes_pipes_and_newlines() {
        assert_eq!(table_cell("a|b\nc"), "a\\|b c");
    }
}
