use serde::{Deserialize, Serialize};

use crate::config::NodeConfig;
use crate::error::CollectError;

// ============================================================================
// Live Node Status
// ============================================================================

/// A node's self-reported replication state (`wsrep_local_state_comment`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncedState {
    Synced,
    Donor,
    Joining,
    Joined,
    Unknown,
}

impl SyncedState {
    pub fn from_state_comment(comment: &str) -> Self {
        let comment = comment.trim();
        if comment.eq_ignore_ascii_case("synced") {
            SyncedState::Synced
        } else if comment.to_ascii_lowercase().starts_with("donor") {
            SyncedState::Donor
        } else if comment.eq_ignore_ascii_case("joined") {
            SyncedState::Joined
        } else if comment.to_ascii_lowercase().starts_with("joining")
            || comment.eq_ignore_ascii_case("waiting on sst")
        {
            SyncedState::Joining
        } else {
            SyncedState::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub synced_state: SyncedState,
    /// Raw `wsrep_local_state_comment`.
    pub local_state: String,
    /// `wsrep_cluster_size` as observed by this node.
    pub cluster_size: u32,
    /// Raw `wsrep_cluster_status`, e.g. `Primary` or `non-Primary`.
    pub cluster_status: String,
    pub read_only: bool,
    pub local_index: Option<String>,
    pub last_committed: Option<i64>,
}

impl NodeStatus {
    pub fn is_primary_component(&self) -> bool {
        self.cluster_status.eq_ignore_ascii_case("primary")
    }
}

// ============================================================================
// Per-node Cluster Status
// ============================================================================

/// What is known about one node after the status and sequence-number phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    /// The live status query answered.
    Reachable { status: NodeStatus },
    /// The live query failed but the node's agent reported its last seqno.
    RecoveredSeqno { error: CollectError, seqno: i64 },
    /// Nothing usable. `agent_error` is set when the agent was asked and failed.
    Unavailable {
        error: CollectError,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_error: Option<CollectError>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClusterStatus {
    pub node: NodeConfig,
    #[serde(flatten)]
    pub state: NodeState,
}

impl NodeClusterStatus {
    pub fn reachable(node: NodeConfig, status: NodeStatus) -> Self {
        Self {
            node,
            state: NodeState::Reachable { status },
        }
    }

    pub fn unavailable(node: NodeConfig, error: CollectError) -> Self {
        Self {
            node,
            state: NodeState::Unavailable {
                error,
                agent_error: None,
            },
        }
    }

    pub fn status(&self) -> Option<&NodeStatus> {
        match &self.state {
            NodeState::Reachable { status } => Some(status),
            _ => None,
        }
    }

    /// The live-status error, kept even when a seqno was recovered.
    pub fn error(&self) -> Option<&CollectError> {
        match &self.state {
            NodeState::Reachable { .. } => None,
            NodeState::RecoveredSeqno { error, .. } | NodeState::Unavailable { error, .. } => {
                Some(error)
            }
        }
    }

    /// Sequence number usable for ranking bootstrap candidates. Galera uses
    /// negative values for "unknown".
    pub fn known_seqno(&self) -> Option<i64> {
        let seqno = match &self.state {
            NodeState::Reachable { status } => status.last_committed,
            NodeState::RecoveredSeqno { seqno, .. } => Some(*seqno),
            NodeState::Unavailable { .. } => None,
        };
        seqno.filter(|s| *s >= 0)
    }
}

// ============================================================================
// Disk Info
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub bytes_total: u64,
    pub bytes_free: u64,
    pub inodes_total: u64,
    pub inodes_free: u64,
}

/// Body of the disk agent's `/api/v1/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub persistent: DiskInfo,
    pub ephemeral: DiskInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskType {
    Persistent,
    Ephemeral,
}

impl std::fmt::Display for DiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskType::Persistent => write!(f, "Persistent"),
            DiskType::Ephemeral => write!(f, "Ephemeral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reading", rename_all = "snake_case")]
pub enum DiskReading {
    Available { info: InfoResponse },
    Failed { error: CollectError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDiskInfo {
    pub node: NodeConfig,
    #[serde(flatten)]
    pub reading: DiskReading,
}

impl NodeDiskInfo {
    pub fn info(&self) -> Option<&InfoResponse> {
        match &self.reading {
            DiskReading::Available { info } => Some(info),
            DiskReading::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpaceIssue {
    pub node: String,
    pub disk_type: DiskType,
    pub used_fraction: f64,
    pub inodes_used_fraction: Option<f64>,
}

// ============================================================================
// Bootstrap Decision
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BootstrapDecision {
    /// At least one node is Synced inside a primary component.
    NotNeeded { healthy_node: String },
    /// The primary component is lost; bootstrap from `candidate`.
    Bootstrap { candidate: String, seqno: i64 },
    /// The primary component is lost but no node reported a seqno.
    ManualInvestigation,
}

impl BootstrapDecision {
    pub fn needs_bootstrap(&self) -> bool {
        !matches!(self, BootstrapDecision::NotNeeded { .. })
    }
}

// ============================================================================
// Canary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "canary", content = "reason", rename_all = "snake_case")]
pub enum CanaryStatus {
    Healthy,
    Unhealthy,
    Unknown(String),
    NotConfigured,
}

// ============================================================================
// Snapshot
// ============================================================================

/// One point-in-time diagnosis of the whole cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: String,
    pub node_cluster_statuses: Vec<NodeClusterStatus>,
    pub node_disk_infos: Vec<NodeDiskInfo>,
    pub disk_space_issues: Vec<DiskSpaceIssue>,
    pub needs_bootstrap: bool,
    pub bootstrap: BootstrapDecision,
    pub canary: CanaryStatus,
}
