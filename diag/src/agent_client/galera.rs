use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::AgentEndpoint;
use crate::config::{GaleraAgentConfig, NodeConfig};
use crate::error::CollectError;
use crate::services::SequenceNumberSource;

/// Last-known sequence number as reported by a node's galera agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNumber {
    pub value: i64,
    pub timestamp: Option<String>,
}

/// The agent answers either with a bare integer or with an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SequenceNumberBody {
    Bare(i64),
    Detailed {
        sequence_number: i64,
        #[serde(default)]
        timestamp: Option<String>,
    },
}

impl From<SequenceNumberBody> for SequenceNumber {
    fn from(body: SequenceNumberBody) -> Self {
        match body {
            SequenceNumberBody::Bare(value) => SequenceNumber {
                value,
                timestamp: None,
            },
            SequenceNumberBody::Detailed {
                sequence_number,
                timestamp,
            } => SequenceNumber {
                value: sequence_number,
                timestamp,
            },
        }
    }
}

pub struct GaleraAgentClient {
    endpoint: AgentEndpoint,
}

impl GaleraAgentClient {
    pub async fn new(host: &str, config: &GaleraAgentConfig, timeout: Duration) -> Result<Self> {
        let endpoint = AgentEndpoint::new(
            host,
            config.api_port,
            "/sequence_number",
            &config.tls,
            timeout,
            &config.username,
            &config.password,
        )
        .await?;

        Ok(Self { endpoint })
    }

    pub async fn sequence_number(&self) -> Result<SequenceNumber> {
        let body: SequenceNumberBody = self.endpoint.fetch().await?;
        Ok(body.into())
    }
}

/// `SequenceNumberSource` backed by the galera agent on every node.
pub struct GaleraAgentSource {
    config: GaleraAgentConfig,
    timeout: Duration,
}

impl GaleraAgentSource {
    pub fn new(config: GaleraAgentConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

#[async_trait]
impl SequenceNumberSource for GaleraAgentSource {
    async fn sequence_number(&self, node: &NodeConfig) -> Result<i64, CollectError> {
        let client = GaleraAgentClient::new(&node.host, &self.config, self.timeout)
            .await
            .map_err(|e| CollectError::AgentUnavailable(format!("{:#}", e)))?;
        let seqno = client
            .sequence_number()
            .await
            .map_err(|e| CollectError::AgentUnavailable(format!("{:#}", e)))?;

        debug!(
            "Galera agent on {} reported seqno {} (at {:?})",
            node.identity(),
            seqno.value,
            seqno.timestamp
        );
        Ok(seqno.value)
    }
}
