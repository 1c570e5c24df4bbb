//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and retry behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Candidate selection settings
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Report rendering settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.retry_attempts == 0 {
            return Err(AppError::validation("fetch.retry_attempts must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(AppError::validation("fetch.max_body_bytes must be > 0"));
        }
        if self.selection.max_selected == 0 {
            return Err(AppError::validation("selection.max_selected must be > 0"));
        }
        if self.selection.keywords.is_empty() {
            return Err(AppError::validation("No selection keywords defined"));
        }
        if self.store.db_path.trim().is_empty() {
            return Err(AppError::validation("store.db_path is empty"));
        }
        if self.report.rationale_width < 8 {
            return Err(AppError::validation("report.rationale_width must be >= 8"));
        }
        Ok(())
    }
}

/// HTTP client and retry behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per URL before classifying a failure as an error
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between retry attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent detections within a source
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Payloads above this size are rejected as oversized
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_body_bytes: defaults::max_body_bytes(),
        }
    }
}

/// Candidate selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Keywords scored against candidate link text and URLs
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// Maximum candidates selected per source
    #[serde(default = "defaults::max_selected")]
    pub max_selected: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            keywords: defaults::keywords(),
            max_selected: defaults::max_selected(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "defaults::db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
        }
    }
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory report files are written to
    #[serde(default = "defaults::report_dir")]
    pub output_dir: String,

    /// Width the summary-table rationale column is truncated to
    #[serde(default = "defaults::rationale_width")]
    pub rationale_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::report_dir(),
            rationale_width: defaults::rationale_width(),
        }
    }
}

/// A monitored source page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Utility/source display name, also the supersession scope
    pub name: String,

    /// Page candidate documents are discovered from
    pub url: String,
}

/// The source-list file a run (and its report) is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceList {
    #[serde(default, rename = "sources")]
    pub sources: Vec<Source>,
}

impl SourceList {
    /// Load a source list from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let list: SourceList = toml::from_str(&content)?;
        if list.sources.is_empty() {
            return Err(AppError::validation(format!(
                "No sources defined in {:?}",
                path.as_ref()
            )));
        }
        Ok(list)
    }
}

mod defaults {
    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tariffwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        500
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_body_bytes() -> usize {
        // Tariff PDFs run a few MB at most
        20 * 1024 * 1024
    }

    // Selection defaults
    pub fn keywords() -> Vec<String> {
        vec![
            "commercial".into(),
            "tariff".into(),
            "rate".into(),
            "schedule".into(),
        ]
    }
    pub fn max_selected() -> usize {
        3
    }

    // Store defaults
    pub fn db_path() -> String {
        "resources/tariff_monitor.db".into()
    }

    // Report defaults
    pub fn report_dir() -> String {
        "reports".into()
    }
    pub fn rationale_width() -> usize {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.fetch.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetch]
            timeout_secs = 10

            [selection]
            max_selected = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.retry_attempts, 3);
        assert_eq!(config.selection.max_selected, 1);
        assert!(!config.selection.keywords.is_empty());
    }

    #[test]
    fn test_source_list_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[sources]]
            name = "Acme Electric"
            url = "https://acme.example/rates"
            "#
        )
        .unwrap();

        let list = SourceList::load(file.path()).unwrap();
        assert_eq!(list.sources.len(), 1);
        assert_eq!(list.sources[0].name, "Acme Electric");
    }

    #[test]
    fn test_source_list_rejects_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "").unwrap();
        assert!(SourceList::load(file.path()).is_err());
    }
}
