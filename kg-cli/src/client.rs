//! HTTP client for the daemon's command surface.
//!
//! Every endpoint answers with the `ApiResponse` envelope; this client unwraps
//! it into the payload or a typed error carrying the daemon's error kind.

use kg_daemon::server::ApiResponse;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Daemon address used when neither `--server` nor `KG_SERVER` is set.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:9130";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL '{0}' (expected http:// or https://)")]
    InvalidServer(String),

    #[error("cannot reach daemon at {server}: {source}")]
    Transport {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    /// The daemon answered with a failure envelope
    #[error("{message} [{kind}, HTTP {status}]")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("unexpected response from daemon (HTTP {status}): {message}")]
    Decode { status: u16, message: String },
}

impl ClientError {
    /// Error kind reported by the daemon, if the request got that far.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub struct DaemonClient {
    http: reqwest::Client,
    base: String,
}

impl DaemonClient {
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let base = server.trim().trim_end_matches('/').to_string();
        match reqwest::Url::parse(&base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ClientError::InvalidServer(server.to_string())),
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ClientError::Transport {
                server: base.clone(),
                source,
            })?;
        Ok(Self { http, base })
    }

    pub fn server(&self) -> &str {
        &self.base
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        tracing::debug!("GET {}{} {:?}", self.base, path, query);
        let request = self.http.get(self.url(path)).query(query);
        self.execute(request).await
    }

    pub async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("{} {}{}", method, self.base, path);
        let request = self.http.request(method, self.url(path)).json(body);
        self.execute(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let transport = |source| ClientError::Transport {
            server: self.base.clone(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;
        from_envelope(status, &body)
    }
}

/// Unwrap an `ApiResponse` body.
pub fn from_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ClientError> {
    let envelope: ApiResponse<T> =
        serde_json::from_slice(body).map_err(|e| ClientError::Decode {
            status,
            message: e.to_string(),
        })?;

    if !envelope.success {
        return Err(ClientError::Api {
            status,
            kind: envelope.kind.unwrap_or_else(|| "error".to_string()),
            message: envelope
                .error
                .unwrap_or_else(|| "request failed".to_string()),
        });
    }
    envelope.data.ok_or_else(|| ClientError::Decode {
        status,
        message: "success envelope without data".to_string(),
    })
}
