//! Document selection.
//!
//! Decides which discovered candidates are worth tracking. The core only
//! needs a deterministic implementation of this capability; the shipped
//! selector scores candidates by keyword hits over link text and URL.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SelectionConfig;

use super::resolver::Candidate;

/// A candidate the selector decided to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedDocument {
    pub url: String,
    pub rationale: String,
}

/// Result of selecting over one source's candidates.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected documents, most relevant first
    pub selected: Vec<SelectedDocument>,

    /// Source-level rationale for the report
    pub overall_rationale: String,
}

/// Capability: pick the candidates worth tracking for a source.
#[async_trait]
pub trait DocumentSelector: Send + Sync {
    async fn select(&self, source_name: &str, candidates: &[Candidate]) -> Result<Selection>;
}

/// Deterministic keyword-scoring selector.
pub struct KeywordSelector {
    keywords: Vec<String>,
    max_selected: usize,
}

impl KeywordSelector {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            keywords: config
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            max_selected: config.max_selected.max(1),
        }
    }

    /// Keywords found in the candidate's link text, context, or URL.
    fn matched_keywords(&self, candidate: &Candidate) -> Vec<&str> {
        let haystack = format!(
            "{} {} {}",
            candidate.link_text, candidate.context, candidate.url
        )
        .to_lowercase();

        self.keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .map(|k| k.as_str())
            .collect()
    }
}

#[async_trait]
impl DocumentSelector for KeywordSelector {
    async fn select(&self, source_name: &str, candidates: &[Candidate]) -> Result<Selection> {
        let mut scored: Vec<(usize, &Candidate, Vec<&str>)> = candidates
            .iter()
            .map(|c| {
                let matched = self.matched_keywords(c);
                (matched.len(), c, matched)
            })
            .filter(|(score, _, _)| *score > 0)
            .collect();

        // Stable sort: ties keep document order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let selected: Vec<SelectedDocument> = scored
            .into_iter()
            .take(self.max_selected)
            .map(|(_, candidate, matched)| SelectedDocument {
                url: candidate.url.clone(),
                rationale: format!("matched keywords: {}", matched.join(", ")),
            })
            .collect();

        let overall_rationale = if selected.is_empty() {
            format!(
                "No candidates for {source_name} matched the configured keywords ({})",
                self.keywords.join(", ")
            )
        } else {
            format!(
                "Selected {} of {} candidates for {source_name} by keyword score",
                selected.len(),
                candidates.len()
            )
        };

        Ok(Selection {
            selected,
            overall_rationale,
        })
    }
}
