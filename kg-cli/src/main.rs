//! kg - command-line client for the knowledge-graph construction daemon
//!
//! Validates HDFS sources, starts and stops constructions, and follows their
//! progress through the daemon's HTTP command surface.

use clap::{ArgGroup, Parser, Subcommand};
use kg_daemon::hdfs::SourceDescriptor;
use kg_daemon::storage::{ConstructionStatus, GraphShape, JobPatch};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod client;
mod commands;
mod output;

use client::{DaemonClient, DEFAULT_SERVER};
use commands::construct::ConstructArgs;
use commands::*;
use output::OutputFormat;

/// Knowledge-graph constructions from HDFS-staged data.
#[derive(Parser)]
#[command(name = "kg")]
#[command(author, version)]
#[command(about = "Drive knowledge-graph constructions from HDFS-staged data")]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  kg validate 10.0.0.4 9000 /data/edges.txt
  kg construct g1 -c c1 --ip 10.0.0.4 --port 9000 --path /data/edges.txt --watch
  kg progress g1 --watch
  kg stop g1 c1")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon base URL
    #[arg(long, global = true, env = "KG_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List an HDFS directory through WebHDFS
    Ls {
        /// NameNode host or IP
        ip: String,
        /// Absolute HDFS path
        path: String,
        /// WebHDFS port (daemon default when omitted)
        #[arg(long)]
        ui_port: Option<u16>,
    },

    /// Check that a source is reachable and names a regular file
    Validate {
        /// NameNode host or IP
        ip: String,
        /// NameNode RPC port
        port: u16,
        /// Absolute HDFS path
        path: String,
        /// WebHDFS port (daemon default when omitted)
        #[arg(long)]
        ui_port: Option<u16>,
    },

    /// Start a construction on a cluster
    Construct {
        /// Graph to build
        graph_id: String,
        /// Backend cluster to run on
        #[arg(short, long)]
        cluster: String,
        /// NameNode host or IP
        #[arg(long)]
        ip: String,
        /// NameNode RPC port
        #[arg(long)]
        port: u16,
        /// Absolute HDFS path of the source file
        #[arg(long)]
        path: String,
        /// WebHDFS port (daemon default when omitted)
        #[arg(long)]
        ui_port: Option<u16>,
        /// Source is an adjacency list rather than an edge list
        #[arg(long)]
        no_edge_list: bool,
        /// Treat edges as directed
        #[arg(long)]
        directed: bool,
        /// Follow progress until the construction finishes
        #[arg(short, long)]
        watch: bool,
        /// Poll interval for --watch, in milliseconds
        #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(100..))]
        interval_ms: u64,
    },

    /// Request a stop of a running construction
    Stop {
        graph_id: String,
        cluster_id: String,
    },

    /// Show the latest construction record of a graph
    Meta { graph_id: String },

    /// Patch the active construction record on a cluster
    #[command(group(
        ArgGroup::new("patch")
            .required(true)
            .multiple(true)
            .args(["status", "progress", "error"])
    ))]
    UpdateMeta {
        cluster_id: String,
        /// New status (running, cancelling, completed, failed, cancelled)
        #[arg(long, value_parser = meta::parse_status)]
        status: Option<ConstructionStatus>,
        /// Progress percentage
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: Option<u8>,
        /// Failure message (only with --status failed)
        #[arg(long)]
        error: Option<String>,
    },

    /// Show construction progress
    Progress {
        /// Graph to report on (all active constructions when omitted)
        graph_id: Option<String>,
        /// Poll until the construction finishes
        #[arg(short, long, requires = "graph_id")]
        watch: bool,
        /// Poll interval for --watch, in milliseconds
        #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(100..))]
        interval_ms: u64,
    },

    /// Show daemon status, clusters and held slots
    #[command(visible_alias = "st")]
    Status,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

fn source(ip: String, port: u16, path: String, ui_port: Option<u16>) -> SourceDescriptor {
    let source = SourceDescriptor::new(ip, port, path);
    match ui_port {
        Some(ui_port) => source.with_ui_port(ui_port),
        None => source,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let client = DaemonClient::new(&cli.server)?;
    let format = cli.format;

    match cli.command {
        Commands::Ls { ip, path, ui_port } => {
            hdfs::run_ls(&client, &ip, &path, ui_port, format).await
        }
        Commands::Validate {
            ip,
            port,
            path,
            ui_port,
        } => hdfs::run_validate(&client, source(ip, port, path, ui_port), format).await,
        Commands::Construct {
            graph_id,
            cluster,
            ip,
            port,
            path,
            ui_port,
            no_edge_list,
            directed,
            watch,
            interval_ms,
        } => {
            let args = ConstructArgs {
                graph_id,
                cluster_id: cluster,
                source: source(ip, port, path, ui_port),
                shape: GraphShape {
                    is_edge_list: !no_edge_list,
                    is_directed: directed,
                },
                watch: watch.then(|| Duration::from_millis(interval_ms)),
            };
            construct::run_construct(&client, args, format).await
        }
        Commands::Stop {
            graph_id,
            cluster_id,
        } => construct::run_stop(&client, &graph_id, &cluster_id, format).await,
        Commands::Meta { graph_id } => meta::run_meta(&client, &graph_id, format).await,
        Commands::UpdateMeta {
            cluster_id,
            status,
            progress,
            error,
        } => {
            let patch = JobPatch {
                status,
                progress,
                error,
            };
            meta::run_update(&client, &cluster_id, patch, format).await
        }
        Commands::Progress {
            graph_id,
            watch,
            interval_ms,
        } => match (graph_id, watch) {
            (Some(graph_id), true) => {
                progress::watch(&client, &graph_id, Duration::from_millis(interval_ms), format)
                    .await
            }
            (graph_id, _) => progress::run(&client, graph_id.as_deref(), format).await,
        },
        Commands::Status => status::run(&client, format).await,
    }
}
