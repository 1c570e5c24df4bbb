//! Pipeline entry points for monitor operations.
//!
//! - `run_monitor`: walk a source list and apply detections to the store
//! - `render_report`: turn the finished run record into a Markdown report

pub mod monitor;
pub mod report;

pub use monitor::run_monitor;
pub use report::render_report;
