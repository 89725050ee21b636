use anyhow::{Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::sync::Arc;

/// Build a TLS server configuration from an inline PEM certificate chain and
/// private key.
pub fn load_server_config(cert_pem: &str, key_pem: &str) -> Result<ServerConfig> {
    let cert_chain = load_certs(cert_pem)?;
    let key = load_private_key(key_pem)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("Failed to create TLS server config")?;

    Ok(config)
}

fn load_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs: Vec<_> = certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse server certificate")?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in tls.certificate");
    }

    Ok(certs)
}

fn load_private_key(pem: &str) -> Result<PrivateKeyDer<'static>> {
    let key = private_key(&mut pem.as_bytes())
        .context("Failed to parse private key")?
        .context("No private key found in tls.private_key")?;

    Ok(key)
}
