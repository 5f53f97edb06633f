//! Shared fixtures: an in-process NameNode, a scripted backend and a served router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use kg_daemon::backend::{
    BackendOutcome, CancelSignal, ConstructionBackend, ConstructionRequest, ProgressSink,
};
use kg_daemon::hdfs::{HdfsValidator, WebHdfsClient};
use kg_daemon::orchestrator::Orchestrator;
use kg_daemon::server::{create_router, AppState};
use kg_daemon::storage::MetaStore;
use kg_daemon::{KgError, Result};

/// File the fake NameNode serves.
pub const EDGE_FILE: &str = "/data/edges.txt";

async fn webhdfs(
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let path = format!("/{}", path.trim_start_matches('/'));
    let op = query.get("op").map(String::as_str).unwrap_or_default();
    let body = match (op, path.as_str()) {
        ("GETFILESTATUS", EDGE_FILE) => {
            serde_json::json!({"FileStatus": {"pathSuffix": "", "type": "FILE", "length": 512}})
        }
        ("GETFILESTATUS", "/data") => {
            serde_json::json!({"FileStatus": {"pathSuffix": "", "type": "DIRECTORY", "length": 0}})
        }
        ("LISTSTATUS", "/data") => serde_json::json!({"FileStatuses": {"FileStatus": [
            {"pathSuffix": "edges.txt", "type": "FILE", "length": 512}
        ]}}),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"RemoteException": {"exception": "FileNotFoundException"}})),
            )
        }
    };
    (StatusCode::OK, Json(body))
}

/// Fake NameNode answering the TCP probe and WebHDFS on one port.
pub async fn spawn_namenode() -> SocketAddr {
    let app = Router::new().route("/webhdfs/v1/*path", get(webhdfs));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub enum Step {
    Progress(u8),
    Complete,
    Fail(&'static str),
    /// Wait for the cancel signal, then acknowledge it
    AckCancel,
}

/// Backend that does exactly what the test tells it to.
pub struct ScriptedBackend {
    steps: Mutex<mpsc::UnboundedReceiver<Step>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ConstructionBackend for ScriptedBackend {
    async fn construct(
        &self,
        _request: ConstructionRequest,
        progress: ProgressSink,
        cancel: CancelSignal,
    ) -> Result<BackendOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut steps = self.steps.lock().await;
        while let Some(step) = steps.recv().await {
            match step {
                Step::Progress(p) => {
                    progress.report(p);
                }
                Step::Complete => return Ok(BackendOutcome::Completed),
                Step::Fail(msg) => return Err(KgError::backend(msg)),
                Step::AckCancel => {
                    cancel.cancelled().await;
                    return Ok(BackendOutcome::Cancelled);
                }
            }
        }
        Err(KgError::backend("script ended"))
    }
}

pub struct TestServer {
    pub base: String,
    pub http: reqwest::Client,
    pub namenode: SocketAddr,
    pub backend: Arc<ScriptedBackend>,
    pub steps: mpsc::UnboundedSender<Step>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Construct body for a graph on a cluster, sourced from the fake NameNode.
    pub fn construct_body(&self, graph: &str, cluster: &str) -> serde_json::Value {
        serde_json::json!({
            "graphId": graph,
            "clusterId": cluster,
            "ip": "127.0.0.1",
            "port": self.namenode.port(),
            "uiPort": self.namenode.port(),
            "path": EDGE_FILE,
            "isEdgeList": "y",
            "isDirected": "n"
        })
    }

    pub async fn get_json(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let response = self.http.get(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = self
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    /// Poll the metadata endpoint until `check` holds.
    pub async fn wait_for_meta<F>(&self, graph: &str, check: F) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        for _ in 0..200 {
            let (status, body) = self
                .get_json(&format!("/construct-kg-meta?graphId={}", graph))
                .await;
            if status == StatusCode::OK && check(&body["data"]) {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("metadata for {graph} never matched");
    }

    pub async fn wait_released(&self) {
        for _ in 0..200 {
            if self.orchestrator.active_slots().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cluster slot never released");
    }
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_server() -> TestServer {
    let namenode = spawn_namenode().await;

    let (steps, rx) = mpsc::unbounded_channel();
    let backend = Arc::new(ScriptedBackend {
        steps: Mutex::new(rx),
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MetaStore::open_in_memory().unwrap());
    let webhdfs = WebHdfsClient::new(Duration::from_secs(2), 9870).unwrap();
    let validator = Arc::new(HdfsValidator::new(webhdfs.clone(), Duration::from_millis(500)));
    let orchestrator = Arc::new(Orchestrator::new(store, validator.clone(), backend.clone()));

    let state = AppState::new(
        Arc::clone(&orchestrator),
        validator,
        webhdfs,
        vec!["c1".to_string(), "c2".to_string()],
    );
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        http: reqwest::Client::new(),
        namenode,
        backend,
        steps,
        orchestrator,
    }
}
