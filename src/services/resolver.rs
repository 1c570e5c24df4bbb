//! Candidate document discovery.
//!
//! Resolves a source page into an ordered list of candidate document URLs.
//! The HTML implementation walks anchor tags, keeps PDF links, resolves
//! them against the page URL, and strips query/fragment decoration.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::Result;
use crate::utils::{clean_url, resolve_url};

/// A discovered candidate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Cleaned absolute URL
    pub url: String,

    /// Anchor text the link was discovered under
    pub link_text: String,

    /// Additional context (anchor title attribute, when present)
    pub context: String,
}

/// Capability: discover candidate document URLs from a source page.
#[async_trait]
pub trait CandidateResolver: Send + Sync {
    /// Resolve a source page into ordered candidates.
    async fn resolve(&self, source_url: &str) -> Result<Vec<Candidate>>;
}

/// Resolver that scrapes PDF links out of an HTML source page.
pub struct HtmlCandidateResolver {
    client: Client,
    anchor_selector: Selector,
    pdf_pattern: Regex,
}

impl HtmlCandidateResolver {
    /// Create a resolver sharing the run's HTTP client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            anchor_selector: Selector::parse("a[href]").expect("valid anchor selector"),
            pdf_pattern: Regex::new(r"(?i)\.pdf").expect("valid pdf pattern"),
        }
    }

    /// Extract PDF candidates from a parsed page, in document order.
    fn extract_candidates(&self, document: &Html, base: &Url) -> Vec<Candidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for anchor in document.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !self.pdf_pattern.is_match(href) {
                continue;
            }

            let resolved = resolve_url(base, href);
            let Some(cleaned) = clean_url(&resolved) else {
                continue;
            };
            if !seen.insert(cleaned.clone()) {
                continue;
            }

            let raw_text: String = anchor.text().collect();
            let link_text = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
            let context = anchor.value().attr("title").unwrap_or("").to_string();

            candidates.push(Candidate {
                url: cleaned,
                link_text,
                context,
            });
        }

        candidates
    }
}

#[async_trait]
impl CandidateResolver for HtmlCandidateResolver {
    async fn resolve(&self, source_url: &str) -> Result<Vec<Candidate>> {
        let base = Url::parse(source_url)?;
        let html = self
            .client
            .get(source_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let document = Html::parse_document(&html);
        let candidates = self.extract_candidates(&document, &base);
        log::info!("Found {} PDF links at {}", candidates.len(), source_url);
        Ok(candidates)
    }
}
