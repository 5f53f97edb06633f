//! Construction metadata: read one graph's record, patch a cluster's record

use anyhow::{Context, Result};
use kg_daemon::storage::{ConstructionJob, ConstructionStatus, JobPatch};
use reqwest::Method;
use serde::Serialize;

use super::{format_time, yes_no};
use crate::client::DaemonClient;
use crate::output::{heading, status_label, Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};

impl TableDisplay for ConstructionJob {
    fn to_table(&self, config: &OutputConfig) -> String {
        let title = format!(
            "{} on {}: {} {}%",
            heading(&self.graph_id, config),
            self.cluster_id,
            status_label(self.status, config),
            self.progress
        );

        let mut pairs = vec![
            ("Job", self.job_id.clone()),
            ("Status", self.status.to_string()),
            ("Progress", format!("{}%", self.progress)),
            (
                "Source",
                format!("{}:{}{}", self.source_host, self.source_port, self.source_path),
            ),
            ("Edge list", yes_no(self.shape.is_edge_list)),
            ("Directed", yes_no(self.shape.is_directed)),
            ("Started", format_time(&self.started_at)),
            ("Updated", format_time(&self.updated_at)),
        ];
        if let Some(error) = &self.error {
            pairs.push(("Error", error.clone()));
        }
        format!("{}\n{}", title, TableOutput::key_value(&pairs, config))
    }
}

/// Parse a status argument (`running`, `Cancelled`, `not-started`, ...).
pub fn parse_status(s: &str) -> std::result::Result<ConstructionStatus, String> {
    ConstructionStatus::parse(s).ok_or_else(|| {
        let names: Vec<&str> = ConstructionStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{}', expected one of: {}", s, names.join(", "))
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMetaBody<'a> {
    cluster_id: &'a str,
    #[serde(flatten)]
    patch: &'a JobPatch,
}

/// Show the latest construction record of a graph.
pub async fn run_meta(client: &DaemonClient, graph_id: &str, format: OutputFormat) -> Result<()> {
    let job: ConstructionJob = client
        .get("/construct-kg-meta", &[("graphId", graph_id.to_string())])
        .await
        .with_context(|| format!("Failed to read metadata of graph {}", graph_id))?;
    Output::new(job, format).render()
}

/// Patch the active record on a cluster.
pub async fn run_update(
    client: &DaemonClient,
    cluster_id: &str,
    patch: JobPatch,
    format: OutputFormat,
) -> Result<()> {
    let body = UpdateMetaBody {
        cluster_id,
        patch: &patch,
    };
    let job: ConstructionJob = client
        .send(Method::PUT, "/construct-kg-meta", &body)
        .await
        .with_context(|| format!("Failed to update metadata on cluster {}", cluster_id))?;
    Output::new(job, format).render()
}
