//! HTTP client for per-cluster construction services.
//!
//! Protocol:
//! - `POST {url}/constructions` with a `ConstructionRequest`, answered by `{id}`
//! - `GET {url}/constructions/{id}` answered by `{state, progress, error?}`
//! - `DELETE {url}/constructions/{id}` asks the service to stop

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::{BackendOutcome, CancelSignal, ConstructionBackend, ConstructionRequest, ProgressSink};
use crate::error::{KgError, Result};

/// Consecutive failed polls before the construction is given up.
const MAX_POLL_FAILURES: u32 = 3;

/// Failed stop requests before the construction is given up.
const MAX_CANCEL_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct Accepted {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RemoteState {
    #[serde(alias = "pending", alias = "queued")]
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
    state: RemoteState,
    #[serde(default)]
    progress: u8,
    #[serde(default)]
    error: Option<String>,
}

/// Backend reaching each cluster's construction service over HTTP.
pub struct RemoteBackend {
    http: reqwest::Client,
    clusters: HashMap<String, String>,
    poll_interval: Duration,
}

impl RemoteBackend {
    /// `clusters` maps cluster ids to service base URLs.
    pub fn new(
        clusters: HashMap<String, String>,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| KgError::Config {
                message: format!("failed to build backend client: {}", e),
            })?;
        let clusters = clusters
            .into_iter()
            .map(|(id, url)| (id, url.trim_end_matches('/').to_string()))
            .collect();
        Ok(Self {
            http,
            clusters,
            poll_interval,
        })
    }

    fn base_url(&self, cluster_id: &str) -> Result<&str> {
        self.clusters
            .get(cluster_id)
            .map(String::as_str)
            .ok_or_else(|| KgError::backend(format!("no construction service configured for cluster '{}'", cluster_id)))
    }

    async fn submit(&self, base: &str, request: &ConstructionRequest) -> Result<String> {
        let accepted: Accepted = self
            .http
            .post(format!("{}/constructions", base))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(accepted.id)
    }

    async fn poll(&self, url: &str) -> Result<RemoteStatus> {
        let status = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }

    async fn request_cancel(&self, url: &str) -> Result<()> {
        self.http.delete(url).send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ConstructionBackend for RemoteBackend {
    async fn construct(
        &self,
        request: ConstructionRequest,
        progress: ProgressSink,
        cancel: CancelSignal,
    ) -> Result<BackendOutcome> {
        let base = self.base_url(&request.cluster_id)?;
        let remote_id = self.submit(base, &request).await?;
        let url = format!("{}/constructions/{}", base, remote_id);
        tracing::info!(
            job_id = %request.job_id,
            cluster_id = %request.cluster_id,
            remote_id = %remote_id,
            "construction submitted"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel_sent = false;
        let mut cancel_failures = 0;
        let mut failures = 0;

        loop {
            // After a failed stop request, retry on the next tick
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled(), if !cancel_sent && cancel_failures == 0 => {}
            }

            if !cancel_sent && cancel.is_cancelled() {
                match self.request_cancel(&url).await {
                    Ok(()) => {
                        cancel_sent = true;
                        tracing::info!(job_id = %request.job_id, "stop forwarded to cluster");
                    }
                    Err(e) => {
                        cancel_failures += 1;
                        tracing::warn!(
                            job_id = %request.job_id,
                            error = %e,
                            attempts = cancel_failures,
                            "failed to forward stop"
                        );
                        if cancel_failures >= MAX_CANCEL_ATTEMPTS {
                            return Err(KgError::backend(format!(
                                "could not forward stop to construction service: {}",
                                e
                            )));
                        }
                    }
                }
            }

            let status = match self.poll(&url).await {
                Ok(status) => {
                    failures = 0;
                    status
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(job_id = %request.job_id, error = %e, failures, "status poll failed");
                    if failures >= MAX_POLL_FAILURES {
                        return Err(KgError::backend(format!(
                            "lost contact with construction service: {}",
                            e
                        )));
                    }
                    continue;
                }
            };

            progress.report(status.progress);
            match status.state {
                RemoteState::Running => {}
                RemoteState::Completed => return Ok(BackendOutcome::Completed),
                RemoteState::Cancelled => return Ok(BackendOutcome::Cancelled),
                RemoteState::Failed => {
                    return Err(KgError::backend(
                        status
                            .error
                            .unwrap_or_else(|| "construction failed on cluster".to_string()),
                    ))
                }
            }
        }
    }
}
