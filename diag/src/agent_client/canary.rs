use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::AgentEndpoint;
use crate::config::{CanaryConfig, TlsConfig};
use crate::error::CollectError;
use crate::services::CanaryProbe;

const CANARY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CanaryStatusBody {
    healthy: bool,
}

/// Client for the replication canary's status API.
pub struct CanaryClient {
    config: CanaryConfig,
}

impl CanaryClient {
    pub fn new(config: CanaryConfig) -> Self {
        Self { config }
    }

    pub async fn status(&self) -> Result<bool> {
        let endpoint = AgentEndpoint::new(
            &self.config.host,
            self.config.api_port,
            "/api/v1/status",
            &TlsConfig::default(),
            CANARY_TIMEOUT,
            &self.config.username,
            &self.config.password,
        )
        .await?;

        let body: CanaryStatusBody = endpoint.fetch().await?;
        Ok(body.healthy)
    }
}

#[async_trait]
impl CanaryProbe for CanaryClient {
    async fn healthy(&self) -> Result<bool, CollectError> {
        self.status()
            .await
            .map_err(|e| CollectError::AgentUnavailable(format!("{:#}", e)))
    }
}
