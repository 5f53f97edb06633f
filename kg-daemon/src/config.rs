//! Daemon configuration loading from `kgd.toml`.
//!
//! Every section is optional; a missing file yields the defaults below.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9130
//!
//! [storage]
//! path = ".kg/constructions.duckdb"
//!
//! [hdfs]
//! probe_timeout_ms = 3000
//! webhdfs_port = 9870
//!
//! [backend]
//! poll_interval_ms = 1000
//! request_timeout_ms = 5000
//!
//! [clusters.c1]
//! url = "http://10.0.0.12:7780"
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KgError, Result};

/// Root configuration structure loaded from `kgd.toml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct DaemonConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source validation against HDFS.
    #[serde(default)]
    pub hdfs: HdfsConfig,

    /// Remote construction service client.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Construction service of each backend cluster, keyed by cluster id.
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9130,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// DuckDB file; parent directories are created on open.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".kg/constructions.duckdb"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HdfsConfig {
    /// Upper bound on the TCP probe and on each WebHDFS request.
    pub probe_timeout_ms: u64,
    /// WebHDFS port used when a request does not name one.
    pub webhdfs_port: u16,
}

impl Default for HdfsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
            webhdfs_port: 9870,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// Base URL of the cluster's construction service.
    pub url: String,
}

impl DaemonConfig {
    /// Load from `path`. A missing file yields defaults; unreadable or
    /// malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|e| KgError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| KgError::Config {
            message: e.to_string(),
        })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.hdfs.probe_timeout_ms == 0 {
            return Err(KgError::Config {
                message: "hdfs.probe_timeout_ms must be positive".to_string(),
            });
        }
        if self.backend.poll_interval_ms == 0 {
            return Err(KgError::Config {
                message: "backend.poll_interval_ms must be positive".to_string(),
            });
        }
        for (id, cluster) in &self.clusters {
            if !(cluster.url.starts_with("http://") || cluster.url.starts_with("https://")) {
                return Err(KgError::Config {
                    message: format!("clusters.{}.url must be an http(s) URL", id),
                });
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.hdfs.probe_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.backend.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.request_timeout_ms)
    }

    /// Cluster id to service URL, as the remote backend takes it.
    pub fn cluster_urls(&self) -> HashMap<String, String> {
        self.clusters
            .iter()
            .map(|(id, cluster)| (id.clone(), cluster.url.clone()))
            .collect()
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }
}
