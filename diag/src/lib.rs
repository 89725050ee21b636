//! Read-only diagnostics for a Galera (MySQL) cluster.
//!
//! Collects per-node cluster status, disk usage and last-committed sequence
//! numbers, then decides whether the cluster needs a bootstrap and which node
//! should seed it.

pub mod agent_client;
pub mod config;
pub mod db;
pub mod error;
pub mod report;
pub mod services;
pub mod types;

pub use config::ClusterConfig;
pub use error::{CollectError, ConfigError};
pub use services::DiagnosticAggregator;
pub use types::Snapshot;
