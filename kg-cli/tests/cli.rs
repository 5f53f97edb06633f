//! End-to-end tests for the kg binary
//!
//! Each test serves the daemon router in-process on an ephemeral port, with a
//! fake NameNode and a backend that runs until it is stopped, then drives it
//! through the real `kg` executable.

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Json, Router};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use kg_daemon::backend::{
    BackendOutcome, CancelSignal, ConstructionBackend, ConstructionRequest, ProgressSink,
};
use kg_daemon::hdfs::{HdfsValidator, WebHdfsClient};
use kg_daemon::orchestrator::Orchestrator;
use kg_daemon::server::{create_router, AppState};
use kg_daemon::storage::MetaStore;

/// Reports a little progress, then runs until stopped.
struct UntilStopped;

#[async_trait]
impl ConstructionBackend for UntilStopped {
    async fn construct(
        &self,
        _request: ConstructionRequest,
        progress: ProgressSink,
        cancel: CancelSignal,
    ) -> kg_daemon::Result<BackendOutcome> {
        progress.report(10);
        cancel.cancelled().await;
        Ok(BackendOutcome::Cancelled)
    }
}

/// NameNode stub: every path is a regular file.
async fn spawn_namenode() -> u16 {
    let app = Router::new().route(
        "/webhdfs/v1/*path",
        get(|| async {
            (
                StatusCode::OK,
                Json(serde_json::json!({"FileStatus": {"pathSuffix": "", "type": "FILE", "length": 64}})),
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn spawn_daemon() -> String {
    let store = Arc::new(MetaStore::open_in_memory().unwrap());
    let webhdfs = WebHdfsClient::new(Duration::from_secs(2), 9870).unwrap();
    let validator = Arc::new(HdfsValidator::new(webhdfs.clone(), Duration::from_millis(500)));
    let orchestrator = Arc::new(Orchestrator::new(store, validator.clone(), Arc::new(UntilStopped)));
    let state = AppState::new(orchestrator, validator, webhdfs, vec!["c1".to_string()]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Run kg against `server` with JSON output.
async fn kg(server: &str, args: &[&str]) -> Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_kg"))
        .args(args)
        .args(["--server", server, "--format", "json"])
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("Failed to execute kg")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("not JSON ({e}): {stdout}"))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_help_lists_commands() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_kg"))
        .arg("--help")
        .output()
        .expect("Failed to execute kg");
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["validate", "construct", "stop", "meta", "update-meta", "progress", "status"] {
        assert!(help.contains(command), "help is missing {command}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_and_empty_progress() {
    let server = spawn_daemon().await;

    let output = kg(&server, &["status"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    let status = stdout_json(&output);
    assert_eq!(status["clusters"], serde_json::json!(["c1"]));
    assert_eq!(status["server"], server);

    let output = kg(&server, &["progress"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout_json(&output), serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_graph_fails() {
    let server = spawn_daemon().await;

    let output = kg(&server, &["meta", "nope"]).await;
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("not_found"), "{err}");
    assert!(err.contains("nope"), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_validate_unreachable_source() {
    let server = spawn_daemon().await;
    let port = closed_port().await.to_string();

    let output = kg(&server, &["validate", "127.0.0.1", &port, "/data/edges.txt"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    let report = stdout_json(&output);
    assert_eq!(report["reachable"], false);
    assert!(report["error"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_construct_stop_and_watch() {
    let server = spawn_daemon().await;
    let namenode = spawn_namenode().await.to_string();

    let output = kg(
        &server,
        &[
            "construct", "g1", "-c", "c1", "--ip", "127.0.0.1", "--port", &namenode, "--ui-port",
            &namenode, "--path", "/data/edges.txt", "--directed",
        ],
    )
    .await;
    assert!(output.status.success(), "{}", stderr(&output));
    let job = stdout_json(&output);
    assert_eq!(job["status"], "running");
    assert_eq!(job["isDirected"], true);

    // A second construction on the busy cluster is refused
    let output = kg(
        &server,
        &[
            "construct", "g2", "-c", "c1", "--ip", "127.0.0.1", "--port", &namenode, "--ui-port",
            &namenode, "--path", "/data/edges.txt",
        ],
    )
    .await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("conflict"));

    let output = kg(&server, &["stop", "g1", "c1"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout_json(&output)["status"], "cancelling");

    let output = kg(&server, &["progress", "g1", "--watch", "--interval-ms", "100"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    let report = stdout_json(&output);
    assert_eq!(report["status"], "cancelled");
    assert_eq!(report["graphId"], "g1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_meta_rejects_illegal_transition() {
    let server = spawn_daemon().await;
    let namenode = spawn_namenode().await.to_string();

    let output = kg(
        &server,
        &[
            "construct", "g1", "-c", "c1", "--ip", "127.0.0.1", "--port", &namenode, "--ui-port",
            &namenode, "--path", "/data/edges.txt",
        ],
    )
    .await;
    assert!(output.status.success(), "{}", stderr(&output));

    let output = kg(&server, &["update-meta", "c1", "--progress", "70"]).await;
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout_json(&output)["progress"], 70);

    let output = kg(&server, &["update-meta", "c1", "--status", "not_started"]).await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid_transition"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_daemon() {
    let server = format!("http://127.0.0.1:{}", closed_port().await);

    let output = kg(&server, &["status"]).await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot reach daemon"));
}
