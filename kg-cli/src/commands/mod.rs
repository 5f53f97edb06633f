//! Command implementations for the kg CLI
//!
//! Each command module provides `run` functions that call the daemon and
//! render the result.

pub mod construct;
pub mod hdfs;
pub mod meta;
pub mod progress;
pub mod status;

use chrono::{DateTime, Utc};

/// Timestamp for table cells.
pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}
