//! HTTP routes and handlers for the construction daemon API.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::websocket::websocket_handler;
use crate::error::{KgError, Result};
use crate::hdfs::{deserialize_opt_port, HdfsEntry, SourceDescriptor, ValidationReport};
use crate::orchestrator::{ConstructRequest, SlotInfo};
use crate::progress::ProgressReport;
use crate::storage::{ConstructionJob, GraphShape, JobPatch};

/// Header the upload UI uses to name the target cluster.
pub const CLUSTER_ID_HEADER: &str = "cluster-id";

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and status
        .route("/health", get(health))
        .route("/status", get(status))
        // HDFS sources
        .route("/graph/hadoop", get(list_hadoop))
        .route("/graph/hadoop/validate-file", post(validate_file))
        // Construction lifecycle
        .route("/graph/hadoop/construct-kg", post(construct_kg))
        .route("/graph/hadoop/stop-construct-kg", post(stop_construct_kg))
        // Metadata and progress
        .route("/construct-kg-meta", get(get_meta).put(update_meta))
        .route("/construct-kg-meta/progress", get(get_progress))
        // WebSocket for live updates
        .route("/ws", get(websocket_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// =============================================================================
// Response Types
// =============================================================================

/// Envelope of every JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Machine-readable error kind, see `KgError::kind`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub duration_ms: u64,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            duration_ms,
        })
    }

    fn err(error: &KgError, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            kind: Some(error.kind().to_string()),
            duration_ms,
        })
    }
}

/// HTTP status for each error kind.
pub fn status_for(error: &KgError) -> StatusCode {
    match error {
        KgError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        KgError::NotFound { .. } => StatusCode::NOT_FOUND,
        KgError::Conflict { .. } | KgError::InvalidTransition { .. } => StatusCode::CONFLICT,
        KgError::Unreachable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        KgError::Backend { .. } => StatusCode::BAD_GATEWAY,
        KgError::Storage(_)
        | KgError::CorruptRecord { .. }
        | KgError::Config { .. }
        | KgError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(start: Instant, success: StatusCode, result: Result<T>) -> Response {
    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(data) => (success, ApiResponse::ok(data, duration_ms)).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "request failed");
            } else {
                tracing::debug!(error = %e, "request rejected");
            }
            (status, ApiResponse::<T>::err(&e, duration_ms)).into_response()
        }
    }
}

fn decode_json<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| KgError::invalid(rejection.body_text()))
}

fn decode_query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| KgError::invalid(rejection.body_text()))
}

/// Cluster id from the body, falling back to the `Cluster-ID` header.
fn cluster_id(body: Option<String>, headers: &HeaderMap) -> Result<String> {
    body.filter(|id| !id.trim().is_empty())
        .or_else(|| {
            headers
                .get(CLUSTER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .filter(|id| !id.is_empty())
        })
        .ok_or_else(|| KgError::invalid("clusterId is required (body or Cluster-ID header)"))
}

// =============================================================================
// Health & Status
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kgd"
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub uptime_seconds: f64,
    pub connections: usize,
    pub schema_version: String,
    pub database: String,
    /// Clusters with a configured construction service
    pub clusters: Vec<String>,
    /// Clusters currently held by a construction
    pub active_slots: Vec<SlotInfo>,
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();
    let result = state.store.schema_version().map(|schema_version| StatusResponse {
        status: "running".to_string(),
        uptime_seconds: state.uptime_seconds(),
        connections: state.ws_connection_count(),
        schema_version,
        database: state
            .store
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string()),
        clusters: state.clusters.clone(),
        active_slots: state.orchestrator.active_slots(),
    });
    respond(start, StatusCode::OK, result)
}

// =============================================================================
// HDFS Sources
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(alias = "host")]
    ip: String,
    #[serde(default, deserialize_with = "deserialize_opt_port")]
    ui_port: Option<u16>,
    path: String,
}

async fn list_hadoop(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let result = async {
        let params = decode_query(params)?;
        if params.ip.trim().is_empty() {
            return Err(KgError::invalid("ip must not be empty"));
        }
        if !params.path.starts_with('/') {
            return Err(KgError::invalid(format!(
                "path must be absolute, got '{}'",
                params.path
            )));
        }
        let port = params.ui_port.unwrap_or(state.webhdfs.default_port());
        state.webhdfs.list(&params.ip, port, &params.path).await
    }
    .await;
    respond::<Vec<HdfsEntry>>(start, StatusCode::OK, result)
}

async fn validate_file(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SourceDescriptor>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = async {
        let source = decode_json(payload)?;
        state.validator.validate(&source).await
    }
    .await;
    respond::<ValidationReport>(start, StatusCode::OK, result)
}

// =============================================================================
// Construction Lifecycle
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConstructBody {
    graph_id: String,
    #[serde(default)]
    cluster_id: Option<String>,
    #[serde(flatten)]
    source: SourceDescriptor,
    #[serde(flatten)]
    shape: GraphShape,
}

async fn construct_kg(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ConstructBody>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = async {
        let body = decode_json(payload)?;
        let request = ConstructRequest {
            cluster_id: cluster_id(body.cluster_id, &headers)?,
            graph_id: body.graph_id,
            source: body.source,
            shape: body.shape,
        };
        state.orchestrator.start(request).await
    }
    .await;
    respond::<ConstructionJob>(start, StatusCode::ACCEPTED, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopBody {
    graph_id: String,
    #[serde(default)]
    cluster_id: Option<String>,
}

async fn stop_construct_kg(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<StopBody>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = decode_json(payload).and_then(|body| {
        let cluster_id = cluster_id(body.cluster_id, &headers)?;
        state.orchestrator.stop(&body.graph_id, &cluster_id)
    });
    respond::<ConstructionJob>(start, StatusCode::OK, result)
}

// =============================================================================
// Metadata & Progress
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaParams {
    graph_id: String,
}

async fn get_meta(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<MetaParams>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let result = decode_query(params).and_then(|params| state.store.get(&params.graph_id));
    respond::<ConstructionJob>(start, StatusCode::OK, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMetaBody {
    #[serde(default)]
    cluster_id: Option<String>,
    #[serde(flatten)]
    patch: JobPatch,
}

async fn update_meta(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateMetaBody>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = decode_json(payload).and_then(|body| {
        let cluster_id = cluster_id(body.cluster_id, &headers)?;
        state.orchestrator.update_meta(&cluster_id, &body.patch)
    });
    respond::<ConstructionJob>(start, StatusCode::OK, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressParams {
    #[serde(default)]
    graph_id: Option<String>,
}

/// One graph's latest construction when `graphId` is given, otherwise every
/// active construction.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<ProgressParams>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let result = decode_query(params).and_then(|params| match params.graph_id {
        Some(graph_id) => state.progress.get_progress(&graph_id).map(|report| vec![report]),
        None => state.progress.in_progress(),
    });
    respond::<Vec<ProgressReport>>(start, StatusCode::OK, result)
}
