//! Start and stop constructions

use anyhow::{Context, Result};
use kg_daemon::hdfs::SourceDescriptor;
use kg_daemon::storage::{ConstructionJob, ConstructionStatus, GraphShape};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;

use super::progress;
use crate::client::DaemonClient;
use crate::output::{Output, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstructBody<'a> {
    graph_id: &'a str,
    cluster_id: &'a str,
    #[serde(flatten)]
    source: &'a SourceDescriptor,
    #[serde(flatten)]
    shape: GraphShape,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody<'a> {
    graph_id: &'a str,
    cluster_id: &'a str,
}

/// What to construct and where.
pub struct ConstructArgs {
    pub graph_id: String,
    pub cluster_id: String,
    pub source: SourceDescriptor,
    pub shape: GraphShape,
    /// Follow the construction until it finishes
    pub watch: Option<Duration>,
}

/// Start a construction, optionally watching it to the end.
pub async fn run_construct(
    client: &DaemonClient,
    args: ConstructArgs,
    format: OutputFormat,
) -> Result<()> {
    let body = ConstructBody {
        graph_id: &args.graph_id,
        cluster_id: &args.cluster_id,
        source: &args.source,
        shape: args.shape,
    };
    let job: ConstructionJob = client
        .send(Method::POST, "/graph/hadoop/construct-kg", &body)
        .await
        .with_context(|| {
            format!(
                "Failed to start construction of graph {} on cluster {}",
                args.graph_id, args.cluster_id
            )
        })?;
    tracing::info!("Started job {} for graph {}", job.job_id, job.graph_id);

    match args.watch {
        Some(interval) => {
            // JSON output is the final report only
            if format == OutputFormat::Table {
                Output::new(job, format).render()?;
            }
            progress::watch(client, &args.graph_id, interval, format).await
        }
        None => Output::new(job, format).render(),
    }
}

/// Request a stop. Finished constructions are reported unchanged.
pub async fn run_stop(
    client: &DaemonClient,
    graph_id: &str,
    cluster_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let job: ConstructionJob = client
        .send(
            Method::POST,
            "/graph/hadoop/stop-construct-kg",
            &StopBody {
                graph_id,
                cluster_id,
            },
        )
        .await
        .with_context(|| format!("Failed to stop construction of graph {}", graph_id))?;

    if job.status == ConstructionStatus::Cancelling {
        tracing::info!("Stop of {} requested, waiting for the backend", graph_id);
    }
    Output::new(job, format).render()
}
