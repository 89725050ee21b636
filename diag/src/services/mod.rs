pub mod aggregator;
pub mod bootstrap;
pub mod cluster_status;
pub mod disk_risk;
pub mod disk_status;
pub mod fanout;
pub mod sequence_numbers;

use async_trait::async_trait;

use crate::config::NodeConfig;
use crate::error::CollectError;
use crate::types::{InfoResponse, NodeStatus};

pub use aggregator::DiagnosticAggregator;
pub use bootstrap::decide_bootstrap;
pub use cluster_status::ClusterStatusCollector;
pub use disk_risk::check_disk_capacity;
pub use disk_status::DiskStatusCollector;

/// Live replication status of one node.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, node: &NodeConfig) -> Result<NodeStatus, CollectError>;
}

/// Last-known sequence number of a node whose database is unreachable.
#[async_trait]
pub trait SequenceNumberSource: Send + Sync {
    async fn sequence_number(&self, node: &NodeConfig) -> Result<i64, CollectError>;
}

/// Filesystem statistics of one node.
#[async_trait]
pub trait DiskInfoSource: Send + Sync {
    async fn disk_info(&self, node: &NodeConfig) -> Result<InfoResponse, CollectError>;
}

/// Replication canary health.
#[async_trait]
pub trait CanaryProbe: Send + Sync {
    async fn healthy(&self) -> Result<bool, CollectError>;
}
