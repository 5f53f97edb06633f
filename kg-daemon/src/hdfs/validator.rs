//! Source validation: reachability probe plus path lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;

use super::source::SourceDescriptor;
use super::webhdfs::WebHdfsClient;
use crate::error::{KgError, Result};

/// Outcome of validating a source descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub reachable: bool,
    pub exists: bool,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            reachable: false,
            exists: false,
            is_directory: false,
            error: Some(error.into()),
        }
    }

    pub fn missing(path: &str) -> Self {
        Self {
            reachable: true,
            exists: false,
            is_directory: false,
            error: Some(format!("path {} does not exist", path)),
        }
    }

    pub fn found(is_directory: bool) -> Self {
        Self {
            reachable: true,
            exists: true,
            is_directory,
            error: None,
        }
    }

    /// Construction needs a reachable, existing regular file.
    pub fn require_file(&self) -> Result<()> {
        if !self.reachable || !self.exists {
            let message = self
                .error
                .clone()
                .unwrap_or_else(|| "source is not available".to_string());
            return Err(KgError::unreachable(message));
        }
        if self.is_directory {
            return Err(KgError::unreachable(
                "source path is a directory, expected a file",
            ));
        }
        Ok(())
    }
}

/// Checks that a source descriptor names reachable data.
#[async_trait]
pub trait SourceValidator: Send + Sync {
    /// Always bounded in time. `Err` only for malformed descriptors;
    /// reachability problems are reported in the returned report.
    async fn validate(&self, source: &SourceDescriptor) -> Result<ValidationReport>;
}

/// Validator for HDFS NameNodes: TCP probe of the RPC port, then a WebHDFS
/// status lookup of the path.
pub struct HdfsValidator {
    webhdfs: WebHdfsClient,
    probe_timeout: Duration,
}

impl HdfsValidator {
    pub fn new(webhdfs: WebHdfsClient, probe_timeout: Duration) -> Self {
        Self {
            webhdfs,
            probe_timeout,
        }
    }
}

/// Open and drop a TCP connection, bounded by `timeout`.
async fn probe(host: &str, port: u16, timeout: Duration) -> std::result::Result<(), String> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(format!("cannot connect to {}:{}: {}", host, port, e)),
        Err(_) => Err(format!(
            "connecting to {}:{} timed out after {}ms",
            host,
            port,
            timeout.as_millis()
        )),
    }
}

#[async_trait]
impl SourceValidator for HdfsValidator {
    async fn validate(&self, source: &SourceDescriptor) -> Result<ValidationReport> {
        source.check()?;

        if let Err(message) = probe(&source.host, source.port, self.probe_timeout).await {
            tracing::debug!(source = %source.authority(), %message, "source probe failed");
            return Ok(ValidationReport::unreachable(message));
        }

        let ui_port = source.ui_port.unwrap_or(self.webhdfs.default_port());
        let report = match self
            .webhdfs
            .file_status(&source.host, ui_port, &source.path)
            .await
        {
            Ok(Some(entry)) => ValidationReport::found(entry.is_directory()),
            Ok(None) => ValidationReport::missing(&source.path),
            Err(e) => ValidationReport::unreachable(e.to_string()),
        };

        tracing::debug!(
            source = %source.authority(),
            path = %source.path,
            reachable = report.reachable,
            exists = report.exists,
            "source validated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::webhdfs::fake;
    use super::*;

    fn validator() -> HdfsValidator {
        let client = WebHdfsClient::new(Duration::from_secs(2), 9870).unwrap();
        HdfsValidator::new(client, Duration::from_millis(500))
    }

    async fn fake_source(path: &str) -> SourceDescriptor {
        let addr = fake::spawn().await;
        SourceDescriptor::new("127.0.0.1", addr.port(), path).with_ui_port(addr.port())
    }

    #[tokio::test]
    async fn test_existing_file() {
        let source = fake_source("/data/edges.txt").await;
        let report = validator().validate(&source).await.unwrap();
        assert_eq!(report, ValidationReport::found(false));
        assert!(report.require_file().is_ok());
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let source = fake_source("/data").await;
        let report = validator().validate(&source).await.unwrap();
        assert!(report.exists);
        assert!(report.is_directory);
        assert!(matches!(
            report.require_file(),
            Err(KgError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_path() {
        let source = fake_source("/data/none.txt").await;
        let report = validator().validate(&source).await.unwrap();
        assert!(report.reachable);
        assert!(!report.exists);
        assert!(report.error.unwrap().contains("/data/none.txt"));
    }

    #[tokio::test]
    async fn test_closed_port_reports_unreachable() {
        let addr = fake::closed_port().await;
        let source = SourceDescriptor::new("127.0.0.1", addr.port(), "/data/edges.txt");
        let report = validator().validate(&source).await.unwrap();
        assert!(!report.reachable);
        assert!(report.error.is_some());
        assert!(report.require_file().is_err());
    }

    #[tokio::test]
    async fn test_malformed_descriptor_is_an_error() {
        let source = SourceDescriptor::new("nn", 9000, "relative/path");
        let err = validator().validate(&source).await.unwrap_err();
        assert!(matches!(err, KgError::InvalidArgument { .. }));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let value = serde_json::to_value(ValidationReport::found(true)).unwrap();
        assert_eq!(value["isDirectory"], true);
        assert!(value.get("error").is_none());
    }
}
