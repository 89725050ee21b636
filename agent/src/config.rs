use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AgentError;

pub const DEFAULT_CONFIG_PATH: &str = "/var/vcap/jobs/mysql-diag-agent/config/mysql-diag-agent.yml";

const DEFAULT_PERSISTENT_DISK_PATH: &str = "/var/vcap/store";
const DEFAULT_EPHEMERAL_DISK_PATH: &str = "/var/vcap/data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub persistent_disk_path: Option<PathBuf>,
    #[serde(default)]
    pub ephemeral_disk_path: Option<PathBuf>,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub tls: ServerTlsConfig,
}

/// Server identity as inline PEM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerTlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub private_key: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let contents = fs::read_to_string(path).map_err(|source| AgentError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, AgentError> {
        let cfg: AgentConfig = serde_yaml::from_str(contents)?;
        if cfg.username.is_empty() {
            return Err(AgentError::InvalidConfig("username must not be empty".to_string()));
        }
        if cfg.tls.enabled && (cfg.tls.certificate.is_empty() || cfg.tls.private_key.is_empty()) {
            return Err(AgentError::InvalidConfig(
                "tls is enabled but certificate or private_key is missing".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn persistent_disk_path(&self) -> PathBuf {
        self.persistent_disk_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PERSISTENT_DISK_PATH))
    }

    pub fn ephemeral_disk_path(&self) -> PathBuf {
        self.ephemeral_disk_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EPHEMERAL_DISK_PATH))
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
