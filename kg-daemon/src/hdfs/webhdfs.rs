//! Minimal WebHDFS REST client (GETFILESTATUS, LISTSTATUS).

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{KgError, Result};

/// Kind of an HDFS entry, as WebHDFS spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One WebHDFS `FileStatus` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdfsEntry {
    /// Name relative to the listed directory (empty for GETFILESTATUS)
    #[serde(default)]
    pub path_suffix: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub modification_time: i64,
}

impl HdfsEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[derive(Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: HdfsEntry,
}

#[derive(Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<HdfsEntry>,
}

/// HTTP client for the NameNode's WebHDFS endpoint.
#[derive(Clone)]
pub struct WebHdfsClient {
    http: reqwest::Client,
    default_port: u16,
}

impl WebHdfsClient {
    /// Every request is bounded by `timeout`.
    pub fn new(timeout: Duration, default_port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| KgError::Config {
                message: format!("failed to build WebHDFS client: {}", e),
            })?;
        Ok(Self { http, default_port })
    }

    /// Port used when a request names none.
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    fn url(&self, host: &str, port: u16, path: &str, op: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| KgError::invalid(format!("invalid WebHDFS address {}:{}: {}", host, port, e)))?;
        url.set_path(&format!("/webhdfs/v1{}", path));
        url.query_pairs_mut().append_pair("op", op);
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                KgError::unreachable(format!("WebHDFS at {} timed out", authority(&url)))
            } else {
                KgError::unreachable(format!("WebHDFS at {} unavailable: {}", authority(&url), e))
            }
        })
    }

    /// Status of one path; `None` when the path does not exist.
    pub async fn file_status(&self, host: &str, port: u16, path: &str) -> Result<Option<HdfsEntry>> {
        let url = self.url(host, port, path, "GETFILESTATUS")?;
        let response = self.send(url).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: FileStatusResponse = response.json().await.map_err(|e| {
                    KgError::unreachable(format!("malformed WebHDFS response: {}", e))
                })?;
                Ok(Some(body.file_status))
            }
            status => Err(KgError::unreachable(format!(
                "WebHDFS returned {} for {}",
                status, path
            ))),
        }
    }

    /// Entries of a directory.
    pub async fn list(&self, host: &str, port: u16, path: &str) -> Result<Vec<HdfsEntry>> {
        let url = self.url(host, port, path, "LISTSTATUS")?;
        let response = self.send(url).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(KgError::not_found(format!("HDFS path '{}'", path))),
            status if status.is_success() => {
                let body: ListStatusResponse = response.json().await.map_err(|e| {
                    KgError::unreachable(format!("malformed WebHDFS response: {}", e))
                })?;
                Ok(body.file_statuses.file_status)
            }
            status => Err(KgError::unreachable(format!(
                "WebHDFS returned {} for {}",
                status, path
            ))),
        }
    }
}

fn authority(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}
