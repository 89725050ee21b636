use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::services::fanout::{fan_out, Phase};
use crate::services::StatusProbe;
use crate::types::NodeClusterStatus;

/// Fans a `StatusProbe` out over every configured node.
///
/// Never fails as a whole: a node that cannot be queried is returned with its
/// error. The result holds exactly one entry per node, in configuration order.
pub struct ClusterStatusCollector {
    probe: Arc<dyn StatusProbe>,
    node_timeout: Duration,
}

impl ClusterStatusCollector {
    pub fn new(probe: Arc<dyn StatusProbe>, node_timeout: Duration) -> Self {
        Self {
            probe,
            node_timeout,
        }
    }

    pub async fn collect(
        &self,
        nodes: &[NodeConfig],
        cancel: &CancellationToken,
    ) -> Vec<NodeClusterStatus> {
        info!("Checking cluster status of {} nodes", nodes.len());

        let probe = self.probe.clone();
        let results = fan_out(nodes, self.node_timeout, cancel, Phase::Status, |node| {
            let probe = probe.clone();
            async move { probe.probe(&node).await }
        })
        .await;

        nodes
            .iter()
            .cloned()
            .zip(results)
            .map(|(node, result)| match result {
                Ok(status) => {
                    info!(
                        "Checking cluster status of {} at {}... done ({})",
                        node.identity(),
                        node.host,
                        status.local_state
                    );
                    NodeClusterStatus::reachable(node, status)
                }
                Err(e) => {
                    warn!(
                        "Checking cluster status of {} at {}... {}",
                        node.identity(),
                        node.host,
                        e
                    );
                    NodeClusterStatus::unavailable(node, e)
                }
            })
            .collect()
    }
}
