use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-node collection failure.
///
/// These never abort a run. They are carried inside the snapshot next to the
/// node they belong to and rendered by whoever consumes it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CollectError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("agent unavailable: {0}")]
    AgentUnavailable(String),
    #[error("disk lookup failed: {0}")]
    DiskLookupFailed(String),
}

impl CollectError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CollectError::Timeout(_))
    }
}

/// Fatal configuration problems, surfaced before any node is queried.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("no mysql nodes configured")]
    NoNodes,
    #[error("duplicate node in config: {0}")]
    DuplicateNode(String),
    #[error("{name} must be within 0..=1, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("timeout {0} must be between 1 and 86400 seconds")]
    InvalidTimeout(&'static str),
    #[error("quorum policy min_cluster_size requires a value of at least 1")]
    InvalidQuorum,
    #[error("invalid tls config for {section}: {reason}")]
    InvalidTls {
        section: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_error_serializes_with_kind() {
        let err = CollectError::AuthFailed("access denied for user 'diag'".to_string());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["kind"], "auth_failed");
        assert_eq!(json["detail"], "access denied for user 'diag'");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = CollectError::Timeout("no response within 10s".to_string());
        assert_eq!(err.to_string(), "timed out: no response within 10s");
        assert!(err.is_timeout());
    }
}
