use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::CollectError;
use crate::services::fanout::{fan_out, Phase};
use crate::services::DiskInfoSource;
use crate::types::{DiskReading, InfoResponse, NodeDiskInfo};

/// Collects disk statistics from every node concurrently.
pub struct DiskStatusCollector {
    source: Arc<dyn DiskInfoSource>,
    node_timeout: Duration,
}

impl DiskStatusCollector {
    pub fn new(source: Arc<dyn DiskInfoSource>, node_timeout: Duration) -> Self {
        Self {
            source,
            node_timeout,
        }
    }

    pub async fn collect(&self, nodes: &[NodeConfig], cancel: &CancellationToken) -> Vec<NodeDiskInfo> {
        info!("Checking disk status of {} nodes", nodes.len());

        let source = self.source.clone();
        let results = fan_out(nodes, self.node_timeout, cancel, Phase::Disk, |node| {
            let source = source.clone();
            async move { source.disk_info(&node).await.and_then(validate_reading) }
        })
        .await;

        let infos: Vec<NodeDiskInfo> = nodes
            .iter()
            .cloned()
            .zip(results)
            .map(|(node, result)| {
                let reading = match result {
                    Ok(info) => {
                        info!("Checking disk status of {} at {}... done", node.identity(), node.host);
                        DiskReading::Available { info }
                    }
                    Err(error) => {
                        warn!(
                            "Checking disk status of {} at {}... {}",
                            node.identity(),
                            node.host,
                            error
                        );
                        DiskReading::Failed { error }
                    }
                };
                NodeDiskInfo { node, reading }
            })
            .collect();

        if infos.iter().all(|i| i.info().is_none()) {
            warn!("Unable to gather disk usage information from any node");
        }

        infos
    }
}

/// A disk reporting no capacity is a broken reading, not an empty disk.
fn validate_reading(info: InfoResponse) -> Result<InfoResponse, CollectError> {
    for (name, disk) in [("persistent", &info.persistent), ("ephemeral", &info.ephemeral)] {
        if disk.bytes_total == 0 {
            return Err(CollectError::DiskLookupFailed(format!(
                "{} disk reported zero total bytes",
                name
            )));
        }
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiskInfo;
    use async_trait::async_trait;

    struct FakeDisks;

    #[async_trait]
    impl DiskInfoSource for FakeDisks {
        async fn disk_info(&self, node: &NodeConfig) -> Result<InfoResponse, CollectError> {
            let disk = |total| DiskInfo {
                bytes_total: total,
                bytes_free: total / 2,
                inodes_total: 100,
                inodes_free: 50,
            };
            match node.uuid.as_str() {
                "ok" => Ok(InfoResponse {
                    persistent: disk(1000),
                    ephemeral: disk(1000),
                }),
                "zero" => Ok(InfoResponse {
                    persistent: disk(0),
                    ephemeral: disk(1000),
                }),
                _ => Err(CollectError::DiskLookupFailed("connection refused".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_collect_isolates_failures() {
        let nodes = vec![
            NodeConfig::new("mysql", "ok", "10.0.0.1"),
            NodeConfig::new("mysql", "zero", "10.0.0.2"),
            NodeConfig::new("mysql", "down", "10.0.0.3"),
        ];
        let collector = DiskStatusCollector::new(Arc::new(FakeDisks), Duration::from_secs(5));
        let infos = collector.collect(&nodes, &CancellationToken::new()).await;

        assert_eq!(infos.len(), 3);
        assert!(infos[0].info().is_some());
        match &infos[1].reading {
            DiskReading::Failed { error } => {
                assert!(matches!(error, CollectError::DiskLookupFailed(m) if m.contains("zero total bytes")))
            }
            other => panic!("unexpected reading {:?}", other),
        }
        assert!(infos[2].info().is_none());
        assert_eq!(infos[2].node.uuid, "down");
    }
}
