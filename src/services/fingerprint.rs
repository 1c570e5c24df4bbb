//! Content fingerprinting and remote metadata capture.
//!
//! Downloads the exact bytes behind a URL and digests them with SHA-256.
//! Identical bytes always yield identical fingerprints; there is no
//! normalization of whitespace or encoding.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use sha2::{Digest, Sha256};

use crate::error::FetchError;
use crate::models::FetchConfig;

/// Result of a full retrieval.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Hex-encoded SHA-256 of the retrieved bytes
    pub fingerprint: String,

    /// Remote `Last-Modified` timestamp, when the server sent one
    pub remote_modified: Option<DateTime<Utc>>,

    /// Size of the retrieved body
    pub byte_size: usize,
}

/// Outcome of a conditional metadata probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Remote metadata proves the content is unchanged since the given time
    Unchanged,
    /// Remote metadata reports a newer modification time
    Modified(DateTime<Utc>),
    /// Probe unsupported, failed, or metadata missing; a full fetch decides
    Inconclusive,
}

/// Fetches documents and computes their content fingerprints.
pub struct Fingerprinter {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
    max_body_bytes: usize,
}

impl Fingerprinter {
    /// Create a fingerprinter sharing the run's HTTP client.
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Retrieve a URL and fingerprint its body.
    ///
    /// Retryable failures are re-attempted up to the configured budget with
    /// a fixed delay; the final failure surfaces to the caller.
    pub async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(content) => return Ok(content),
                Err(e) if attempt < self.retry_attempts && e.is_retryable() => {
                    log::debug!("Attempt {attempt} for {url} failed: {e}. Retrying.");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let remote_modified = parse_last_modified(response.headers());

        // Reject oversized bodies before downloading when the server
        // announces a length, and again after in case it lied.
        if let Some(len) = response.content_length() {
            if len as usize > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_body_bytes,
                });
            }
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if bytes.len() > self.max_body_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_body_bytes,
            });
        }

        Ok(FetchedContent {
            fingerprint: fingerprint_bytes(&bytes),
            remote_modified,
            byte_size: bytes.len(),
        })
    }

    /// Conditional metadata probe via HEAD.
    ///
    /// Answers "unchanged since `since`" from the `Last-Modified` header
    /// without downloading the body. Any failure or missing header is
    /// `Inconclusive`, never `Unchanged`.
    pub async fn probe(&self, url: &str, since: DateTime<Utc>) -> ProbeOutcome {
        let response = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Probe for {url} failed: {e}");
                return ProbeOutcome::Inconclusive;
            }
        };

        if !response.status().is_success() {
            return ProbeOutcome::Inconclusive;
        }

        classify_probe(parse_last_modified(response.headers()), since)
    }
}

/// Hex-encoded SHA-256 digest of a byte slice.
pub(crate) fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn classify_probe(remote: Option<DateTime<Utc>>, since: DateTime<Utc>) -> ProbeOutcome {
    match remote {
        Some(modified) if modified <= since => ProbeOutcome::Unchanged,
        Some(modified) => ProbeOutcome::Modified(modified),
        None => ProbeOutcome::Inconclusive,
    }
}

fn parse_last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)?
        .to_str()
        .ok()
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
