use crate::config::QuorumPolicy;
use crate::types::{BootstrapDecision, NodeClusterStatus, NodeStatus, SyncedState};

/// Quorum rules a reachable node must satisfy to count as a healthy member of
/// a primary component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub policy: QuorumPolicy,
    pub require_writable: bool,
}

impl Default for Quorum {
    fn default() -> Self {
        Self {
            policy: QuorumPolicy::PrimaryComponent,
            require_writable: true,
        }
    }
}

impl QuorumPolicy {
    /// Whether `status` describes a view large enough for a primary component
    /// of a cluster with `configured_nodes` members.
    pub fn admits(&self, status: &NodeStatus, configured_nodes: usize) -> bool {
        let seen = status.cluster_size as usize;
        match *self {
            QuorumPolicy::PrimaryComponent => {
                status.is_primary_component() && (configured_nodes <= 1 || seen > 1)
            }
            QuorumPolicy::Majority => seen * 2 > configured_nodes,
            QuorumPolicy::MinClusterSize(min) => seen >= min as usize,
        }
    }
}

impl Quorum {
    pub fn is_healthy(&self, status: &NodeStatus, configured_nodes: usize) -> bool {
        status.synced_state == SyncedState::Synced
            && !(self.require_writable && status.read_only)
            && self.policy.admits(status, configured_nodes)
    }
}

/// Decide whether the cluster lost its primary component and, if so, which
/// node to bootstrap from.
///
/// Pure function over the merged per-node records. Candidates are ranked by
/// known sequence number; ties go to the node configured first. Without any
/// known sequence number no candidate is named.
pub fn decide_bootstrap(statuses: &[NodeClusterStatus], quorum: &Quorum) -> BootstrapDecision {
    let configured = statuses.len();

    if let Some(healthy) = statuses.iter().find(|s| {
        s.status()
            .is_some_and(|status| quorum.is_healthy(status, configured))
    }) {
        return BootstrapDecision::NotNeeded {
            healthy_node: healthy.node.identity(),
        };
    }

    let mut best: Option<(&NodeClusterStatus, i64)> = None;
    for status in statuses {
        let Some(seqno) = status.known_seqno() else {
            continue;
        };
        match best {
            Some((_, best_seqno)) if best_seqno >= seqno => {}
            _ => best = Some((status, seqno)),
        }
    }

    match best {
        Some((candidate, seqno)) => BootstrapDecision::Bootstrap {
            candidate: candidate.node.identity(),
            seqno,
        },
        None => BootstrapDecision::ManualInvestigation,
    }
}
