//! Cluster exclusivity under concurrent construct requests.
//!
//! Many callers race to start constructions:
//! - On one cluster exactly one request is accepted, the rest get 409
//! - Different clusters never block each other

mod common;

use common::{spawn_server, Step};
use reqwest::Method;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_cluster_admits_one_job() {
    let server = Arc::new(spawn_server().await);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let body = server.construct_body(&format!("g{}", i), "c1");
                let (status, _) = server
                    .send_json(Method::POST, "/graph/hadoop/construct-kg", &body)
                    .await;
                status.as_u16()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }
    statuses.sort_unstable();

    assert_eq!(statuses.iter().filter(|s| **s == 202).count(), 1, "{statuses:?}");
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 5, "{statuses:?}");

    let (_, body) = server.get_json("/construct-kg-meta/progress").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(server.orchestrator.active_slots().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clusters_are_independent() {
    let server = Arc::new(spawn_server().await);

    let a = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let body = server.construct_body("g1", "c1");
            server
                .send_json(Method::POST, "/graph/hadoop/construct-kg", &body)
                .await
                .0
        })
    };
    let b = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let body = server.construct_body("g2", "c2");
            server
                .send_json(Method::POST, "/graph/hadoop/construct-kg", &body)
                .await
                .0
        })
    };

    assert_eq!(a.await.unwrap().as_u16(), 202);
    assert_eq!(b.await.unwrap().as_u16(), 202);
    assert_eq!(server.orchestrator.active_slots().len(), 2);
}

#[tokio::test]
async fn test_cluster_reusable_after_terminal_status() {
    let server = spawn_server().await;
    let (status, _) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g1", "c1"),
        )
        .await;
    assert_eq!(status.as_u16(), 202);

    server.steps.send(Step::Complete).unwrap();
    server
        .wait_for_meta("g1", |job| job["status"] == "completed")
        .await;
    server.wait_released().await;

    let (status, body) = server
        .send_json(
            Method::POST,
            "/graph/hadoop/construct-kg",
            &server.construct_body("g2", "c1"),
        )
        .await;
    assert_eq!(status.as_u16(), 202);
    assert_eq!(body["data"]["graphId"], "g2");
}
