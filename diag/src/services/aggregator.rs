use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent_client::{CanaryClient, DiagAgentSource, GaleraAgentSource};
use crate::config::{ClusterConfig, NodeConfig};
use crate::db::MysqlStatusProbe;
use crate::error::ConfigError;
use crate::services::bootstrap::{decide_bootstrap, Quorum};
use crate::services::disk_risk::check_disk_capacity;
use crate::services::sequence_numbers::recover_sequence_numbers;
use crate::services::{
    CanaryProbe, ClusterStatusCollector, DiskInfoSource, DiskStatusCollector, SequenceNumberSource,
    StatusProbe,
};
use crate::types::{BootstrapDecision, CanaryStatus, NodeClusterStatus, NodeDiskInfo, Snapshot};

/// Runs every collector for one cluster and merges the results into a
/// `Snapshot`.
pub struct DiagnosticAggregator {
    config: Arc<ClusterConfig>,
    quorum: Quorum,
    status_probe: Arc<dyn StatusProbe>,
    seqno_source: Option<Arc<dyn SequenceNumberSource>>,
    disk_source: Option<Arc<dyn DiskInfoSource>>,
    canary: Option<Arc<dyn CanaryProbe>>,
}

impl DiagnosticAggregator {
    /// Wire up the MySQL, galera agent, disk agent and canary clients that
    /// `config` describes.
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        let timeouts = config.timeouts.clone();
        let status_probe = Arc::new(MysqlStatusProbe::new(&config.mysql, &timeouts));
        let galera_agent = config.galera_agent.clone();
        let disk_agent = config.mysql.agent.clone();
        let canary = config.canary.clone();

        let mut aggregator = Self::with_status_probe(config, status_probe)?;
        if let Some(galera_agent) = galera_agent {
            aggregator = aggregator.with_sequence_numbers(Arc::new(GaleraAgentSource::new(
                galera_agent,
                timeouts.agent(),
            )));
        }
        if let Some(disk_agent) = disk_agent {
            aggregator = aggregator
                .with_disk_info(Arc::new(DiagAgentSource::new(disk_agent, timeouts.disk_agent())));
        }
        if let Some(canary) = canary {
            aggregator = aggregator.with_canary(Arc::new(CanaryClient::new(canary)));
        }

        Ok(aggregator)
    }

    /// An aggregator with only the live status phase. Agents are added with
    /// the `with_*` methods.
    pub fn with_status_probe(
        config: ClusterConfig,
        status_probe: Arc<dyn StatusProbe>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let quorum = Quorum {
            policy: config.quorum.policy()?,
            require_writable: config.quorum.require_writable,
        };

        Ok(Self {
            config: Arc::new(config),
            quorum,
            status_probe,
            seqno_source: None,
            disk_source: None,
            canary: None,
        })
    }

    pub fn with_sequence_numbers(mut self, source: Arc<dyn SequenceNumberSource>) -> Self {
        self.seqno_source = Some(source);
        self
    }

    pub fn with_disk_info(mut self, source: Arc<dyn DiskInfoSource>) -> Self {
        self.disk_source = Some(source);
        self
    }

    pub fn with_canary(mut self, canary: Arc<dyn CanaryProbe>) -> Self {
        self.canary = Some(canary);
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub async fn aggregate(&self) -> Snapshot {
        self.aggregate_with_cancel(CancellationToken::new()).await
    }

    /// Produce one snapshot. Cancelling `cancel`, or exceeding the configured
    /// run timeout, stops every outstanding check; those nodes are reported
    /// as timed out.
    pub async fn aggregate_with_cancel(&self, cancel: CancellationToken) -> Snapshot {
        let run = cancel.child_token();
        let run_limit = self.config.timeouts.run();
        let deadline = {
            let run = run.clone();
            tokio::spawn(async move {
                tokio::time::sleep(run_limit).await;
                warn!("Diagnostic run exceeded {:?}, cancelling outstanding checks", run_limit);
                run.cancel();
            })
        };

        let nodes = self.config.nodes();
        let (node_cluster_statuses, node_disk_infos, canary) = tokio::join!(
            self.cluster_phase(nodes, &run),
            self.disk_phase(nodes, &run),
            self.canary_phase(&run),
        );
        deadline.abort();

        let bootstrap = decide_bootstrap(&node_cluster_statuses, &self.quorum);
        let disk_space_issues =
            check_disk_capacity(&node_disk_infos, &self.config.mysql.threshold);

        match &bootstrap {
            BootstrapDecision::NotNeeded { healthy_node } => {
                info!("Bootstrap not necessary, {} is healthy", healthy_node)
            }
            BootstrapDecision::Bootstrap { candidate, seqno } => warn!(
                "Cluster needs bootstrap, candidate {} (seqno {})",
                candidate, seqno
            ),
            BootstrapDecision::ManualInvestigation => {
                warn!("Cluster needs bootstrap, no node reported a sequence number")
            }
        }
        for issue in &disk_space_issues {
            warn!(
                "{} disk usage is very high on node {} ({:.1}%)",
                issue.disk_type,
                issue.node,
                issue.used_fraction * 100.0
            );
        }

        Snapshot {
            taken_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            node_cluster_statuses,
            node_disk_infos,
            disk_space_issues,
            needs_bootstrap: bootstrap.needs_bootstrap(),
            bootstrap,
            canary,
        }
    }

    async fn cluster_phase(
        &self,
        nodes: &[NodeConfig],
        run: &CancellationToken,
    ) -> Vec<NodeClusterStatus> {
        let collector =
            ClusterStatusCollector::new(self.status_probe.clone(), self.config.timeouts.node_status());
        let statuses = collector.collect(nodes, run).await;

        match &self.seqno_source {
            Some(source) => {
                recover_sequence_numbers(source.clone(), statuses, self.config.timeouts.agent(), run)
                    .await
            }
            None => {
                info!("Galera Agent not configured, skipping sequence number check");
                statuses
            }
        }
    }

    async fn disk_phase(&self, nodes: &[NodeConfig], run: &CancellationToken) -> Vec<NodeDiskInfo> {
        let Some(source) = &self.disk_source else {
            info!("Agent not configured, skipping disk check");
            return Vec::new();
        };

        DiskStatusCollector::new(source.clone(), self.config.timeouts.disk_agent())
            .collect(nodes, run)
            .await
    }

    async fn canary_phase(&self, run: &CancellationToken) -> CanaryStatus {
        let Some(canary) = &self.canary else {
            info!("Canary not configured, skipping health check");
            return CanaryStatus::NotConfigured;
        };

        tokio::select! {
            _ = run.cancelled() => CanaryStatus::Unknown("canary check cancelled".to_string()),
            result = canary.healthy() => match result {
                Ok(true) => {
                    info!("Checking canary status... healthy");
                    CanaryStatus::Healthy
                }
                Ok(false) => {
                    warn!("Checking canary status... unhealthy");
                    CanaryStatus::Unhealthy
                }
                Err(e) => {
                    warn!("Checking canary status... {}", e);
                    CanaryStatus::Unknown(e.to_string())
                }
            },
        }
    }
}
