//! Source descriptors naming data staged on an HDFS cluster.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{KgError, Result};

/// Location of raw data on an HDFS-like store.
///
/// Accepts the field names the upload form sends (`ip`, `hadoopIp`,
/// `hadoopPort`, `hadoopFilePath`) next to the canonical ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// NameNode host or IP
    #[serde(alias = "ip", alias = "hadoopIp")]
    pub host: String,
    /// NameNode RPC port
    #[serde(alias = "hadoopPort", deserialize_with = "deserialize_port")]
    pub port: u16,
    /// WebHDFS (NameNode UI) port; daemon default applies when absent
    #[serde(default, deserialize_with = "deserialize_opt_port")]
    pub ui_port: Option<u16>,
    /// Absolute HDFS path
    #[serde(alias = "hadoopFilePath")]
    pub path: String,
}

impl SourceDescriptor {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            ui_port: None,
            path: path.into(),
        }
    }

    pub fn with_ui_port(mut self, ui_port: u16) -> Self {
        self.ui_port = Some(ui_port);
        self
    }

    /// Reject descriptors that cannot name a location.
    pub fn check(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(KgError::invalid("source host must not be empty"));
        }
        if self.host.contains(['/', ' ']) {
            return Err(KgError::invalid(format!("invalid source host '{}'", self.host)));
        }
        if self.port == 0 {
            return Err(KgError::invalid("source port must be between 1 and 65535"));
        }
        if self.ui_port == Some(0) {
            return Err(KgError::invalid("WebHDFS port must be between 1 and 65535"));
        }
        if !self.path.starts_with('/') {
            return Err(KgError::invalid(format!(
                "source path must be absolute, got '{}'",
                self.path
            )));
        }
        Ok(())
    }

    /// `host:port` of the NameNode.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u64),
    Text(String),
}

fn port_from_repr<E: de::Error>(repr: PortRepr) -> std::result::Result<u16, E> {
    let value = match repr {
        PortRepr::Number(n) => n,
        PortRepr::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| E::custom(format!("port '{}' is not numeric", s)))?,
    };
    u16::try_from(value).map_err(|_| E::custom(format!("port {} is out of range", value)))
}

/// Ports arrive as numbers or numeric strings from HTML forms.
pub(crate) fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    port_from_repr(PortRepr::deserialize(deserializer)?)
}

pub(crate) fn deserialize_opt_port<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PortRepr>::deserialize(deserializer)? {
        Some(PortRepr::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(repr) => port_from_repr(repr).map(Some),
        None => Ok(None),
    }
}
