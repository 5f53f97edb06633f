//! Progress queries and live watching

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use kg_daemon::progress::ProgressReport;
use kg_daemon::storage::ConstructionStatus;
use serde::Serialize;
use std::io::IsTerminal;
use std::time::Duration;

use super::format_time;
use crate::client::DaemonClient;
use crate::output::{status_label, Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ProgressTable(pub Vec<ProgressReport>);

impl TableDisplay for ProgressTable {
    fn to_table(&self, config: &OutputConfig) -> String {
        if self.0.is_empty() {
            return "No constructions in progress".to_string();
        }
        let rows: Vec<Vec<String>> = self
            .0
            .iter()
            .map(|report| {
                vec![
                    report.graph_id.clone(),
                    report.cluster_id.clone(),
                    report.status.to_string(),
                    format!("{:>3}%", report.progress),
                    format_time(&report.updated_at),
                    report.error.clone().unwrap_or_default(),
                ]
            })
            .collect();
        TableOutput::from_rows(
            &["Graph", "Cluster", "Status", "Progress", "Updated", "Error"],
            &rows,
            &[(0, 24), (5, 40)],
            config,
        )
    }
}

impl TableDisplay for ProgressReport {
    fn to_table(&self, config: &OutputConfig) -> String {
        let mut line = format!(
            "{} on {}: {} {}%",
            self.graph_id,
            self.cluster_id,
            status_label(self.status, config),
            self.progress
        );
        if let Some(error) = &self.error {
            line.push_str(&format!(" ({})", error));
        }
        line
    }
}

async fn fetch(client: &DaemonClient, graph_id: Option<&str>) -> Result<Vec<ProgressReport>> {
    let query: Vec<(&str, String)> = graph_id
        .map(|graph| vec![("graphId", graph.to_string())])
        .unwrap_or_default();
    let reports = client
        .get("/construct-kg-meta/progress", &query)
        .await
        .context("Failed to read construction progress")?;
    Ok(reports)
}

/// Show progress of one graph, or of every active construction.
pub async fn run(client: &DaemonClient, graph_id: Option<&str>, format: OutputFormat) -> Result<()> {
    let reports = fetch(client, graph_id).await?;
    Output::new(ProgressTable(reports), format).render()
}

fn bar_style() -> Result<ProgressStyle> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
        .progress_chars("=> ");
    Ok(style)
}

/// Poll a graph's construction until it reaches a terminal status, drawing
/// a progress bar on stderr. Fails when the construction fails.
pub async fn watch(
    client: &DaemonClient,
    graph_id: &str,
    interval: Duration,
    format: OutputFormat,
) -> Result<()> {
    let bar = if format == OutputFormat::Table && std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(100);
        bar.set_style(bar_style()?);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };

    let report = loop {
        let report = match fetch(client, Some(graph_id)).await {
            Ok(mut reports) if !reports.is_empty() => reports.remove(0),
            Ok(_) => {
                bar.abandon();
                bail!("Daemon returned no progress for graph {}", graph_id);
            }
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        };
        bar.set_position(u64::from(report.progress));
        bar.set_message(format!("{} on {}: {}", graph_id, report.cluster_id, report.status));
        tracing::debug!("{} at {}% ({})", graph_id, report.progress, report.status);

        if report.status.is_terminal() {
            break report;
        }
        tokio::time::sleep(interval).await;
    };
    bar.finish_and_clear();

    let failed = report.status == ConstructionStatus::Failed;
    let error = report.error.clone().unwrap_or_default();
    Output::new(report, format).render()?;
    if failed {
        bail!("Construction of graph {} failed: {}", graph_id, error);
    }
    Ok(())
}
