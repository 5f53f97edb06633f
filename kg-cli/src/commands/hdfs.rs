//! HDFS browsing and source validation

use anyhow::{Context, Result};
use chrono::DateTime;
use colored::Colorize;
use kg_daemon::hdfs::{EntryKind, HdfsEntry, SourceDescriptor, ValidationReport};
use reqwest::Method;
use serde::Serialize;

use super::yes_no;
use crate::client::DaemonClient;
use crate::output::{Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};

/// Directory listing as returned by WebHDFS.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct Listing(pub Vec<HdfsEntry>);

impl TableDisplay for Listing {
    fn to_table(&self, config: &OutputConfig) -> String {
        let rows: Vec<Vec<String>> = self
            .0
            .iter()
            .map(|entry| {
                vec![
                    entry.path_suffix.clone(),
                    kind_label(entry.kind).to_string(),
                    if entry.is_directory() {
                        "-".to_string()
                    } else {
                        format_size(entry.length)
                    },
                    format_modified(entry.modification_time),
                ]
            })
            .collect();
        TableOutput::from_rows(&["Name", "Type", "Size", "Modified"], &rows, &[(0, 48)], config)
    }
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Directory => "dir",
        EntryKind::Symlink => "link",
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_modified(millis: i64) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_millis(millis)
        .map(|at| super::format_time(&at))
        .unwrap_or_else(|| "-".to_string())
}

/// Validation outcome together with the source it was computed for.
#[derive(Debug, Serialize)]
pub struct Validation {
    #[serde(skip)]
    pub source: SourceDescriptor,
    #[serde(flatten)]
    pub report: ValidationReport,
}

impl TableDisplay for Validation {
    fn to_table(&self, config: &OutputConfig) -> String {
        let report = &self.report;
        let kind = match (report.exists, report.is_directory) {
            (false, _) => "-",
            (true, true) => "directory",
            (true, false) => "file",
        };
        let mut pairs = vec![
            (
                "Source",
                format!("{}{}", self.source.authority(), self.source.path),
            ),
            ("Reachable", yes_no(report.reachable)),
            ("Exists", yes_no(report.exists)),
            ("Kind", kind.to_string()),
        ];
        if let Some(error) = &report.error {
            pairs.push(("Error", error.clone()));
        }

        let verdict = match report.require_file() {
            Ok(()) => {
                let text = "Source is ready for construction";
                if config.use_colors() {
                    text.green().bold().to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                let text = format!("Source cannot be constructed: {}", e);
                if config.use_colors() {
                    text.red().bold().to_string()
                } else {
                    text
                }
            }
        };
        format!("{}\n{}", TableOutput::key_value(&pairs, config), verdict)
    }
}

/// List an HDFS directory.
pub async fn run_ls(
    client: &DaemonClient,
    ip: &str,
    path: &str,
    ui_port: Option<u16>,
    format: OutputFormat,
) -> Result<()> {
    let mut query = vec![("ip", ip.to_string()), ("path", path.to_string())];
    if let Some(port) = ui_port {
        query.push(("uiPort", port.to_string()));
    }
    let entries: Vec<HdfsEntry> = client
        .get("/graph/hadoop", &query)
        .await
        .with_context(|| format!("Failed to list {}", path))?;
    Output::new(Listing(entries), format).render()
}

/// Probe a source and report whether it can be constructed from.
pub async fn run_validate(
    client: &DaemonClient,
    source: SourceDescriptor,
    format: OutputFormat,
) -> Result<()> {
    let report: ValidationReport = client
        .send(Method::POST, "/graph/hadoop/validate-file", &source)
        .await
        .context("Validation request failed")?;
    Output::new(Validation { source, report }, format).render()
}
