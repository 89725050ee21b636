use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::AgentEndpoint;
use crate::config::{DiskAgentConfig, NodeConfig};
use crate::error::CollectError;
use crate::services::DiskInfoSource;
use crate::types::InfoResponse;

/// Client for the `mysql-diag-agent` running on one node.
pub struct DiagAgentClient {
    endpoint: AgentEndpoint,
}

impl DiagAgentClient {
    pub async fn new(host: &str, config: &DiskAgentConfig, timeout: Duration) -> Result<Self> {
        let endpoint = AgentEndpoint::new(
            host,
            config.port,
            "/api/v1/info",
            &config.tls,
            timeout,
            &config.username,
            &config.password,
        )
        .await?;

        Ok(Self { endpoint })
    }

    pub async fn info(&self) -> Result<InfoResponse> {
        self.endpoint.fetch().await
    }
}

pub struct DiagAgentSource {
    config: DiskAgentConfig,
    timeout: Duration,
}

impl DiagAgentSource {
    pub fn new(config: DiskAgentConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

#[async_trait]
impl DiskInfoSource for DiagAgentSource {
    async fn disk_info(&self, node: &NodeConfig) -> Result<InfoResponse, CollectError> {
        let client = DiagAgentClient::new(&node.host, &self.config, self.timeout)
            .await
            .map_err(|e| CollectError::DiskLookupFailed(format!("{:#}", e)))?;
        client
            .info()
            .await
            .map_err(|e| CollectError::DiskLookupFailed(format!("{:#}", e)))
    }
}
