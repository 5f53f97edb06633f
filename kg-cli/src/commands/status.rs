//! Status command - daemon health, configured clusters and held slots

use anyhow::{Context, Result};
use colored::Colorize;
use kg_daemon::server::StatusResponse;
use serde::Serialize;

use super::format_time;
use crate::client::DaemonClient;
use crate::output::{heading, Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatus {
    pub server: String,
    #[serde(flatten)]
    pub status: StatusResponse,
}

/// `3725.4` seconds -> `1h 02m 05s`.
pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

impl TableDisplay for DaemonStatus {
    fn to_table(&self, config: &OutputConfig) -> String {
        let status = &self.status;
        let mut lines = Vec::new();

        let title = format!("KG daemon: {}", status.status);
        lines.push(if config.use_colors() {
            title.green().bold().to_string()
        } else {
            title
        });

        let clusters = if status.clusters.is_empty() {
            "(none configured)".to_string()
        } else {
            status.clusters.join(", ")
        };
        let pairs = vec![
            ("Server", self.server.clone()),
            ("Uptime", format_uptime(status.uptime_seconds)),
            ("Database", status.database.clone()),
            ("Schema", status.schema_version.clone()),
            ("Clusters", clusters),
            ("Watchers", status.connections.to_string()),
        ];
        lines.push(TableOutput::key_value(&pairs, config));

        lines.push(String::new());
        if status.active_slots.is_empty() {
            lines.push("No active constructions".to_string());
        } else {
            lines.push(heading("Active constructions", config));
            let rows: Vec<Vec<String>> = status
                .active_slots
                .iter()
                .map(|slot| {
                    vec![
                        slot.cluster_id.clone(),
                        slot.graph_id.clone(),
                        slot.phase.to_string(),
                        slot.job_id.clone().unwrap_or_else(|| "-".to_string()),
                        format_time(&slot.since),
                    ]
                })
                .collect();
            lines.push(TableOutput::from_rows(
                &["Cluster", "Graph", "Phase", "Job", "Since"],
                &rows,
                &[(3, 36)],
                config,
            ));
        }
        lines.join("\n")
    }
}

/// Show daemon status.
pub async fn run(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let status: StatusResponse = client
        .get("/status", &[])
        .await
        .context("Failed to read daemon status")?;
    Output::new(
        DaemonStatus {
            server: client.server().to_string(),
            status,
        },
        format,
    )
    .render()
}
