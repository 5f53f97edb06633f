//! Error types for the construction daemon.

use thiserror::Error;

/// Result type alias for kg-daemon operations.
pub type Result<T> = std::result::Result<T, KgError>;

/// Errors surfaced by the validator, metadata store and orchestrator.
#[derive(Error, Debug)]
pub enum KgError {
    /// Malformed request (missing identifiers, bad port, relative path).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the request.
        message: String,
    },

    /// The data source could not be reached or does not hold usable data.
    #[error("Source unreachable: {message}")]
    Unreachable {
        /// Validator or probe error message.
        message: String,
    },

    /// A construction job is already active on the cluster.
    #[error("Cluster {cluster_id} already runs a construction for graph {graph_id}")]
    Conflict {
        /// Cluster holding the active job.
        cluster_id: String,
        /// Graph of the active job.
        graph_id: String,
    },

    /// No construction metadata for the given key.
    #[error("No construction metadata for {what}")]
    NotFound {
        /// Human readable description of the missing key.
        what: String,
    },

    /// A status patch does not follow the construction state machine.
    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// The distributed backend failed the construction.
    #[error("Backend failure: {message}")]
    Backend {
        /// Error reported by the backend or its transport.
        message: String,
    },

    /// Metadata store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] duckdb::Error),

    /// A stored row no longer decodes into a construction record.
    #[error("Corrupt record: {message}")]
    CorruptRecord {
        /// What failed to decode, and for which graph.
        message: String,
    },

    /// Invalid daemon configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// IO error (config files, database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KgError {
    pub fn invalid(message: impl Into<String>) -> Self {
        KgError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        KgError::Unreachable {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        KgError::NotFound { what: what.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        KgError::Backend {
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in API envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            KgError::InvalidArgument { .. } => "invalid_argument",
            KgError::Unreachable { .. } => "unreachable",
            KgError::Conflict { .. } => "conflict",
            KgError::NotFound { .. } => "not_found",
            KgError::InvalidTransition { .. } => "invalid_transition",
            KgError::Backend { .. } => "backend_failure",
            KgError::Storage(_) | KgError::CorruptRecord { .. } => "storage",
            KgError::Config { .. } => "config",
            KgError::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for KgError {
    fn from(err: reqwest::Error) -> Self {
        KgError::Backend {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KgError::Conflict {
            cluster_id: "c1".to_string(),
            graph_id: "g1".to_string(),
        };
        assert!(err.to_string().contains("c1"));
        assert!(err.to_string().contains("g1"));

        let err = KgError::InvalidTransition {
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        assert_eq!(err.to_string(), "Illegal status transition completed -> running");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(KgError::invalid("x").kind(), "invalid_argument");
        assert_eq!(KgError::unreachable("x").kind(), "unreachable");
        assert_eq!(KgError::not_found("x").kind(), "not_found");
        assert_eq!(KgError::backend("x").kind(), "backend_failure");
        let corrupt = KgError::CorruptRecord {
            message: "x".to_string(),
        };
        assert_eq!(corrupt.kind(), "storage");
    }
}
