//! End-to-end construction flows through the HTTP command surface.

mod common;

use axum::http::StatusCode;
use common::{closed_port, spawn_server, Step, EDGE_FILE};
use reqwest::Method;
use serde_json::json;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_health_and_status() {
    let server = spawn_server().await;

    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = server.get_json("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["clusters"], json!(["c1", "c2"]));
    assert_eq!(body["data"]["activeSlots"], json!([]));
    assert_eq!(body["data"]["schemaVersion"], "1.0.0");
}

#[tokio::test]
async fn test_list_and_validate() {
    let server = spawn_server().await;
    let port = server.namenode.port();

    let (status, body) = server
        .get_json(&format!("/graph/hadoop?ip=127.0.0.1&uiPort={}&path=/data", port))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["pathSuffix"], "edges.txt");
    assert_eq!(body["data"][0]["type"], "FILE");

    let (status, body) = server
        .get_json(&format!("/graph/hadoop?ip=127.0.0.1&uiPort={}&path=/missing", port))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/validate-file",
            &json!({"ip": "127.0.0.1", "port": port, "uiPort": port, "path": EDGE_FILE}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reachable"], true);
    assert_eq!(body["data"]["exists"], true);
    assert_eq!(body["data"]["isDirectory"], false);

    let (status, body) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/validate-file",
            &json!({"ip": "127.0.0.1", "port": closed_port().await, "path": EDGE_FILE}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reachable"], false);
}

#[tokio::test]
async fn test_construct_progress_stop_scenario() {
    let server = spawn_server().await;

    let (status, body) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g1", "c1"),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "running");
    assert_eq!(body["data"]["progress"], 0);

    server.steps.send(Step::Progress(40)).unwrap();
    server.wait_for_meta("g1", |job| job["progress"] == 40).await;

    let (status, body) = server
        .get_json("/construct-kg-meta/progress?graphId=g1")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["status"], "running");
    assert_eq!(body["data"][0]["progress"], 40);

    let stop = json!({"graphId": "g1", "clusterId": "c1"});
    let (status, body) = server
        .send_json(Method::POST, "/graph/hadoop/stop-construct-kg", &stop)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelling");

    server.steps.send(Step::AckCancel).unwrap();
    let job = server
        .wait_for_meta("g1", |job| job["status"] == "cancelled")
        .await;
    assert_eq!(job["progress"], 40);
    assert_eq!(job["sourcePath"], EDGE_FILE);
    assert_eq!(job["isEdgeList"], true);

    // Stopping a finished job is a no-op, not an error
    let (status, body) = server
        .send_json(Method::POST, "/graph/hadoop/stop-construct-kg", &stop)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_unreachable_source_records_failure() {
    let server = spawn_server().await;
    let body = json!({
        "graphId": "g1",
        "clusterId": "c1",
        "ip": "127.0.0.1",
        "port": closed_port().await,
        "path": EDGE_FILE
    });

    let (status, response) = server
        .send_json(Method::POST, "/graph/hadoop/construct-kg", &body)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["success"], false);
    assert_eq!(response["kind"], "unreachable");

    let (status, meta) = server.get_json("/construct-kg-meta?graphId=g1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["data"]["status"], "failed");
    assert!(!meta["data"]["error"].as_str().unwrap().is_empty());
    assert_eq!(server.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_directory_source_is_rejected() {
    let server = spawn_server().await;
    let mut body = server.construct_body("g1", "c1");
    body["path"] = json!("/data");

    let (status, _) = server
        .send_json(Method::POST, "/graph/hadoop/construct-kg", &body)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    server.wait_released().await;
}

#[tokio::test]
async fn test_cluster_id_from_header() {
    let server = spawn_server().await;
    let mut body = server.construct_body("g1", "ignored");
    body.as_object_mut().unwrap().remove("clusterId");

    let response = server
        .http
        .post(server.url("/graph/hadoop/construct-kg"))
        .header("Cluster-ID", "c2")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["clusterId"], "c2");
}

#[tokio::test]
async fn test_backend_failure_surfaces_through_metadata() {
    let server = spawn_server().await;
    let (status, _) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g1", "c1"),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    server.steps.send(Step::Fail("partition worker lost")).unwrap();
    let job = server
        .wait_for_meta("g1", |job| job["status"] == "failed")
        .await;
    assert!(job["error"]
        .as_str()
        .unwrap()
        .contains("partition worker lost"));
}

#[tokio::test]
async fn test_update_meta() {
    let server = spawn_server().await;
    server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g1", "c1"),
        )
        .await;

    let (status, body) = server
        .send_json(
            Method::PUT,
            "/construct-kg-meta",
            &json!({"clusterId": "c1", "progress": 55}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"], 55);

    // Progress never goes back
    let (_, body) = server
        .send_json(
            Method::PUT,
            "/construct-kg-meta",
            &json!({"clusterId": "c1", "progress": 20}),
        )
        .await;
    assert_eq!(body["data"]["progress"], 55);

    let (status, body) = server
        .send_json(
            Method::PUT,
            "/construct-kg-meta",
            &json!({"clusterId": "c1", "status": "cancelled"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, _) = server
        .send_json(
            Method::PUT,
            "/construct-kg-meta",
            &json!({"clusterId": "c9", "progress": 10}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests() {
    let server = spawn_server().await;

    let (status, body) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &json!({"graphId": "g1", "clusterId": "c1", "ip": "nn", "port": "abc", "path": "/d"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");

    let (status, _) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &json!({"graphId": "g1", "ip": "nn", "port": 9000, "path": "/d"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/validate-file",
            &json!({"ip": "nn", "port": 9000, "path": "relative"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.get_json("/construct-kg-meta").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/stop-construct-kg",
            &json!({"graphId": "nope", "clusterId": "c1"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_progress_lists_active_jobs() {
    let server = spawn_server().await;
    let (_, body) = server.get_json("/construct-kg-meta/progress").await;
    assert_eq!(body["data"], json!([]));

    server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g1", "c1"),
        )
        .await;
    let (status, body) = server.get_json("/construct-kg-meta/progress").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["graphId"], "g1");

    server.steps.send(Step::Complete).unwrap();
    server
        .wait_for_meta("g1", |job| job["status"] == "completed")
        .await;
    let (_, body) = server.get_json("/construct-kg-meta/progress").await;
    assert_eq!(body["data"], json!([]));
}
