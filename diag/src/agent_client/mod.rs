pub mod canary;
pub mod disk;
pub mod galera;

use anyhow::{Context, Result};
use reqwest::{Certificate, Client, Url};
use serde::de::DeserializeOwned;
use std::net::Ipv6Addr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::TlsConfig;

pub use canary::CanaryClient;
pub use disk::{DiagAgentClient, DiagAgentSource};
pub use galera::{GaleraAgentClient, GaleraAgentSource, SequenceNumber};

/// IPv6 literals need brackets in the authority part of a URL.
fn bracket_ipv6(host: &str) -> String {
    match host.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{}]", host),
        Err(_) => host.to_string(),
    }
}

/// One authenticated JSON endpoint on a node-local agent.
pub struct AgentEndpoint {
    url: Url,
    client: Client,
    username: String,
    password: String,
    user_agent: String,
}

impl AgentEndpoint {
    /// Build an endpoint for `path` on `host:port`.
    ///
    /// With TLS enabled, only `tls.ca` is trusted and `tls.server_name` (when
    /// set) is the name the certificate is verified against; the connection
    /// still goes to `host`.
    pub async fn new(
        host: &str,
        port: u16,
        path: &str,
        tls: &TlsConfig,
        timeout: Duration,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);

        let (scheme, url_host) = if tls.enabled {
            let certs = Certificate::from_pem_bundle(tls.ca.as_bytes())
                .context("Failed to parse agent CA certificate")?;
            if certs.is_empty() {
                anyhow::bail!("TLS is enabled but no CA certificate was configured");
            }
            builder = builder.use_rustls_tls().tls_built_in_root_certs(false);
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }

            match tls.server_name.as_deref().filter(|n| !n.is_empty()) {
                Some(server_name) => {
                    let addr = tokio::net::lookup_host((host, port))
                        .await
                        .with_context(|| format!("Failed to resolve {}", host))?
                        .next()
                        .with_context(|| format!("No address found for {}", host))?;
                    builder = builder.resolve(server_name, addr);
                    ("https", server_name.to_string())
                }
                None => ("https", host.to_string()),
            }
        } else {
            ("http", host.to_string())
        };

        let url = Url::parse(&format!(
            "{}://{}:{}{}",
            scheme,
            bracket_ipv6(&url_host),
            port,
            path
        ))
            .with_context(|| format!("Invalid agent URL for host {}", host))?;
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            url,
            client,
            username: username.to_string(),
            password: password.to_string(),
            user_agent: format!("mysql-diag/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// GET the endpoint and decode its JSON body.
    pub async fn fetch<T: DeserializeOwned>(&self) -> Result<T> {
        let req_id = Uuid::new_v4().to_string();
        debug!("HTTP GET {} (request id {})", self.url, req_id);

        let resp = self
            .client
            .get(self.url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header("user-agent", &self.user_agent)
            .header("x-request-id", &req_id)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Unexpected status code: {} ({})", status.as_u16(), body.trim());
        }

        let bytes = resp.bytes().await.context("Failed to read response body")?;
        let result = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse response from {}", self.url))?;

        Ok(result)
    }
}
