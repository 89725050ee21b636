//! Node-local agent serving filesystem statistics to `mysql-diag`.

pub mod api;
pub mod config;
pub mod disk;
pub mod error;
pub mod tls;
pub mod types;

pub use api::{create_router, AppState};
pub use config::AgentConfig;
