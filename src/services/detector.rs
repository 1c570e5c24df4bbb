//! Change detection over tracked URLs.
//!
//! Decides, per URL, whether a fetch is needed and whether the resulting
//! fingerprint represents a change. Quick mode tries a conditional metadata
//! probe first and only short-circuits when the remote proves the content
//! unchanged; every other probe outcome falls through to a full fetch.

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::models::TrackedDocument;

use super::fingerprint::{Fingerprinter, ProbeOutcome};

/// Result of one detection attempt.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Fingerprint on record after this detection
    pub fingerprint: String,

    /// Remote modification timestamp, when known
    pub remote_modified: Option<DateTime<Utc>>,

    /// Whether the content differs from the prior observation
    pub changed: bool,

    /// True when the probe short-circuited and no body was fetched
    pub probed: bool,
}

/// Detects content changes for tracked URLs.
pub struct ChangeDetector {
    fingerprinter: Fingerprinter,
    quick_mode: bool,
}

impl ChangeDetector {
    /// Create a detector. `quick_mode` enables the conditional probe.
    pub fn new(fingerprinter: Fingerprinter, quick_mode: bool) -> Self {
        Self {
            fingerprinter,
            quick_mode,
        }
    }

    /// Detect whether the content behind `url` changed relative to `prior`.
    ///
    /// A first-ever observation always counts as changed; there is no
    /// "unchanged" state without a prior fingerprint.
    pub async fn detect(
        &self,
        url: &str,
        prior: Option<&TrackedDocument>,
    ) -> Result<Detection, FetchError> {
        if self.quick_mode {
            // The probe needs both a fingerprint to reuse and a timestamp
            // to compare against; without either it cannot prove anything.
            if let Some(doc) = prior {
                if let (Some(fingerprint), Some(since)) =
                    (doc.fingerprint.as_deref(), doc.content_updated_at)
                {
                    match self.fingerprinter.probe(url, since).await {
                        ProbeOutcome::Unchanged => {
                            log::debug!("Probe: {url} unchanged since {since}, skipping fetch");
                            return Ok(Detection {
                                fingerprint: fingerprint.to_string(),
                                remote_modified: doc.content_updated_at,
                                changed: false,
                                probed: true,
                            });
                        }
                        ProbeOutcome::Modified(ts) => {
                            log::debug!("Probe: {url} modified at {ts}, full fetch");
                        }
                        ProbeOutcome::Inconclusive => {
                            log::debug!("Probe inconclusive for {url}, full fetch");
                        }
                    }
                }
            }
        }

        let fetched = self.fingerprinter.fetch(url).await?;
        let changed = is_changed(
            prior.and_then(|d| d.fingerprint.as_deref()),
            &fetched.fingerprint,
        );

        Ok(Detection {
            fingerprint: fetched.fingerprint,
            remote_modified: fetched.remote_modified,
            changed,
            probed: false,
        })
    }
}

/// Changed iff there is no prior fingerprint or the digests differ.
fn is_changed(prior: Option<&str>, current: &str) -> bool {
    match prior {
        Some(prev) => prev != current,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_changed() {
        assert!(is_changed(None, "abc"));
    }

    #[test]
    fn test_identical_fingerprint_is_unchanged() {
        assert!(!is_changed(Some("abc"), "abc"));
    }

    #[test]
    fn test_different_fingerprint_is_changed() {
        assert!(is_changed(Some("abc"), "def"));
    }
}
