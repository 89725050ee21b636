use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::services::fanout::{fan_out, Phase};
use crate::services::SequenceNumberSource;
use crate::types::{NodeClusterStatus, NodeState};

/// Ask the out-of-band agent of every unreachable node for its last-known
/// sequence number.
///
/// Reachable nodes are left alone since their live value is fresher. The
/// live-status error is kept on every node; only its state changes
/// from `Unavailable` to `RecoveredSeqno` when the agent answers.
pub async fn recover_sequence_numbers(
    source: Arc<dyn SequenceNumberSource>,
    statuses: Vec<NodeClusterStatus>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<NodeClusterStatus> {
    let down: Vec<NodeConfig> = statuses
        .iter()
        .filter(|s| s.status().is_none())
        .map(|s| s.node.clone())
        .collect();

    if down.is_empty() {
        return statuses;
    }

    info!("Recovering sequence numbers of {} unreachable nodes", down.len());

    let results = fan_out(&down, timeout, cancel, Phase::SequenceNumber, |node| {
        let source = source.clone();
        async move { source.sequence_number(&node).await }
    })
    .await;

    let mut results = down.into_iter().zip(results);
    statuses
        .into_iter()
        .map(|NodeClusterStatus { node, state }| {
            let error = match state {
                NodeState::Reachable { .. } => return NodeClusterStatus { node, state },
                NodeState::Unavailable { error, .. } | NodeState::RecoveredSeqno { error, .. } => {
                    error
                }
            };
            // `down` holds the unreachable entries in the same order.
            let Some((_, result)) = results.next() else {
                return NodeClusterStatus::unavailable(node, error);
            };

            let state = match result {
                Ok(seqno) => {
                    info!("Sequence number of {}: {}", node.identity(), seqno);
                    NodeState::RecoveredSeqno { error, seqno }
                }
                Err(agent_error) => {
                    warn!(
                        "Error retrieving galera agent sequence number of {}: {}",
                        node.identity(),
                        agent_error
                    );
                    NodeState::Unavailable {
                        error,
                        agent_error: Some(agent_error),
                    }
                }
            };

            NodeClusterStatus { node, state }
        })
        .collect()
}
