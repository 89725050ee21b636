use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// One day. Longer timeouts are configuration mistakes.
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_CONFIG_PATH: &str = "/var/vcap/jobs/mysql-diag/config/mysql-diag-config.yml";

// ============================================================================
// Cluster Configuration
// ============================================================================

/// Everything one diagnostic run needs. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub galera_agent: Option<GaleraAgentConfig>,
    #[serde(default)]
    pub canary: Option<CanaryConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub quorum: QuorumConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Disk agent running next to every node. Disk checks are skipped without it.
    #[serde(default)]
    pub agent: Option<DiskAgentConfig>,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// Identity of one cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    /// Overrides `mysql.port` for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl NodeConfig {
    pub fn new(name: &str, uuid: &str, host: &str) -> Self {
        Self {
            host: host.to_string(),
            name: name.to_string(),
            uuid: uuid.to_string(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Display identity, `name/uuid`.
    pub fn identity(&self) -> String {
        if self.uuid.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, self.uuid)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskAgentConfig {
    pub username: String,
    pub password: String,
    pub port: u16,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaleraAgentConfig {
    pub username: String,
    pub password: String,
    pub api_port: u16,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryConfig {
    pub username: String,
    pub password: String,
    pub api_port: u16,
    #[serde(default = "default_canary_host")]
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// PEM bundle trusted for this endpoint. Replaces the system roots.
    #[serde(default)]
    pub ca: String,
    #[serde(default)]
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_warning_fraction")]
    pub disk_used_warning_fraction: f64,
    #[serde(default = "default_warning_fraction")]
    pub disk_inodes_used_warning_fraction: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            disk_used_warning_fraction: default_warning_fraction(),
            disk_inodes_used_warning_fraction: default_warning_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
    #[serde(default = "default_agent_secs")]
    pub agent_secs: u64,
    #[serde(default = "default_disk_agent_secs")]
    pub disk_agent_secs: u64,
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    /// Upper bound for one node's live status probe (connect plus queries).
    pub fn node_status(&self) -> Duration {
        self.connect().saturating_add(self.query())
    }

    pub fn agent(&self) -> Duration {
        Duration::from_secs(self.agent_secs)
    }

    pub fn disk_agent(&self) -> Duration {
        Duration::from_secs(self.disk_agent_secs)
    }

    pub fn run(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            query_secs: default_query_secs(),
            agent_secs: default_agent_secs(),
            disk_agent_secs: default_disk_agent_secs(),
            run_secs: default_run_secs(),
        }
    }
}

// ============================================================================
// Quorum Policy
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumPolicyKind {
    #[default]
    PrimaryComponent,
    Majority,
    MinClusterSize,
}

/// How a node's own view of the cluster is judged sufficient for a primary
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumPolicy {
    /// `wsrep_cluster_status` is `Primary` and, when more than one node is
    /// configured, the node does not see itself alone.
    PrimaryComponent,
    /// The node sees strictly more than half of the configured nodes.
    Majority,
    /// The node sees at least this many members.
    MinClusterSize(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumConfig {
    #[serde(default)]
    pub policy: QuorumPolicyKind,
    #[serde(default)]
    pub min_cluster_size: Option<u32>,
    /// A Synced node that is read-only cannot take writes and does not count.
    #[serde(default = "default_true")]
    pub require_writable: bool,
}

impl QuorumConfig {
    pub fn policy(&self) -> Result<QuorumPolicy, ConfigError> {
        match self.policy {
            QuorumPolicyKind::PrimaryComponent => Ok(QuorumPolicy::PrimaryComponent),
            QuorumPolicyKind::Majority => Ok(QuorumPolicy::Majority),
            QuorumPolicyKind::MinClusterSize => match self.min_cluster_size {
                Some(n) if n >= 1 => Ok(QuorumPolicy::MinClusterSize(n)),
                _ => Err(ConfigError::InvalidQuorum),
            },
        }
    }
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            policy: QuorumPolicyKind::default(),
            min_cluster_size: None,
            require_writable: true,
        }
    }
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let cfg: ClusterConfig = serde_yaml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.mysql.nodes
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mysql.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }

        let mut identities = HashSet::new();
        let mut endpoints = HashSet::new();
        for node in &self.mysql.nodes {
            let identity = node.identity();
            if !identities.insert(identity.clone()) {
                return Err(ConfigError::DuplicateNode(identity));
            }
            let endpoint = format!("{}:{}", node.host, node.port.unwrap_or(self.mysql.port));
            if !endpoints.insert(endpoint.clone()) {
                return Err(ConfigError::DuplicateNode(endpoint));
            }
        }

        check_fraction(
            "disk_used_warning_fraction",
            self.mysql.threshold.disk_used_warning_fraction,
        )?;
        check_fraction(
            "disk_inodes_used_warning_fraction",
            self.mysql.threshold.disk_inodes_used_warning_fraction,
        )?;

        let t = &self.timeouts;
        for (name, secs) in [
            ("connect_secs", t.connect_secs),
            ("query_secs", t.query_secs),
            ("agent_secs", t.agent_secs),
            ("disk_agent_secs", t.disk_agent_secs),
            ("run_secs", t.run_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::InvalidTimeout(name));
            }
        }

        self.quorum.policy()?;

        if let Some(agent) = &self.mysql.agent {
            check_tls("mysql.agent", &agent.tls)?;
        }
        if let Some(galera_agent) = &self.galera_agent {
            check_tls("galera_agent", &galera_agent.tls)?;
        }

        Ok(())
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidThreshold { name, value });
    }
    Ok(())
}

fn check_tls(section: &'static str, tls: &TlsConfig) -> Result<(), ConfigError> {
    if !tls.enabled {
        return Ok(());
    }

    let certs = rustls_pemfile::certs(&mut tls.ca.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::InvalidTls {
            section,
            reason: format!("failed to parse ca: {}", e),
        })?;

    if certs.is_empty() {
        return Err(ConfigError::InvalidTls {
            section,
            reason: "tls is enabled but no ca certificate was found".to_string(),
        });
    }

    Ok(())
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_canary_host() -> String {
    "127.0.0.1".to_string()
}

fn default_warning_fraction() -> f64 {
    0.8
}

fn default_connect_secs() -> u64 {
    10
}

fn default_query_secs() -> u64 {
    10
}

fn default_agent_secs() -> u64 {
    30
}

fn default_disk_agent_secs() -> u64 {
    10
}

fn default_run_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}
