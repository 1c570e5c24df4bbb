// src/models/mod.rs

//! Domain models for the monitor application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod document;
mod run;

// Re-export all public types
pub use config::{Config, FetchConfig, ReportConfig, SelectionConfig, Source, SourceList, StoreConfig};
pub use document::{DocumentStatus, TrackedDocument, UpsertOutcome};
pub use run::{RunRecord, SelectionOutcome, SelectionResult, SourceOutcome};
