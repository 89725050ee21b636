use async_trait::async_trait;
use sqlx::error::DatabaseError;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{MysqlConfig, NodeConfig, TimeoutConfig};
use crate::error::CollectError;
use crate::services::StatusProbe;
use crate::types::{NodeStatus, SyncedState};

const WSREP_STATUS_QUERY: &str = "SHOW STATUS LIKE 'wsrep_%'";
const READ_ONLY_QUERY: &str = "SHOW GLOBAL VARIABLES LIKE 'read_only'";

/// MySQL access denied (ER_ACCESS_DENIED_ERROR).
const ER_ACCESS_DENIED: u16 = 1045;

/// Reads live replication status from one node over a fresh connection.
///
/// Each call opens and closes exactly one connection and never retries.
pub struct MysqlStatusProbe {
    username: String,
    password: String,
    default_port: u16,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl MysqlStatusProbe {
    pub fn new(mysql: &MysqlConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            username: mysql.username.clone(),
            password: mysql.password.clone(),
            default_port: mysql.port,
            connect_timeout: timeouts.connect(),
            query_timeout: timeouts.query(),
        }
    }

    fn connect_options(&self, node: &NodeConfig) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&node.host)
            .port(node.port.unwrap_or(self.default_port))
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(MySqlSslMode::Preferred)
    }

    /// Query one node's Galera status
    pub async fn status(&self, node: &NodeConfig) -> Result<NodeStatus, CollectError> {
        let options = self.connect_options(node);
        debug!("Connecting to {} at {}", node.identity(), node.host);

        let mut conn = match tokio::time::timeout(self.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(classify_connect_error(e)),
            Err(_) => {
                return Err(CollectError::Timeout(format!(
                    "connection not established within {:?}",
                    self.connect_timeout
                )))
            }
        };

        let result = tokio::time::timeout(self.query_timeout, read_status(&mut conn)).await;

        if let Err(e) = conn.close().await {
            debug!("Closing connection to {} failed: {}", node.identity(), e);
        }

        match result {
            Ok(status) => status,
            Err(_) => Err(CollectError::Timeout(format!(
                "status queries did not complete within {:?}",
                self.query_timeout
            ))),
        }
    }
}

#[async_trait]
impl StatusProbe for MysqlStatusProbe {
    async fn probe(&self, node: &NodeConfig) -> Result<NodeStatus, CollectError> {
        self.status(node).await
    }
}

async fn read_status(conn: &mut MySqlConnection) -> Result<NodeStatus, CollectError> {
    let rows: Vec<(Vec<u8>, Vec<u8>)> = sqlx::query_as(WSREP_STATUS_QUERY)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_failed)?;

    let rows: Vec<(String, String)> = rows
        .into_iter()
        .map(|(k, v)| {
            (
                String::from_utf8_lossy(&k).into_owned(),
                String::from_utf8_lossy(&v).into_owned(),
            )
        })
        .collect();

    let mut status = parse_wsrep_status(rows.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    let read_only: Option<(Vec<u8>, Vec<u8>)> = sqlx::query_as(READ_ONLY_QUERY)
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_failed)?;

    status.read_only = match read_only {
        Some((_, value)) => parse_on_off(&String::from_utf8_lossy(&value)),
        None => {
            warn!("read_only variable missing, assuming writable");
            false
        }
    };

    Ok(status)
}

/// Build a `NodeStatus` from `SHOW STATUS LIKE 'wsrep_%'` rows.
pub fn parse_wsrep_status<'a, I>(rows: I) -> Result<NodeStatus, CollectError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut seen_any = false;
    let mut local_state = None;
    let mut cluster_status = String::new();
    let mut cluster_size = 0u32;
    let mut local_index = None;
    let mut last_committed = None;
    let mut last_applied = None;

    for (key, value) in rows {
        seen_any = true;
        match key {
            "wsrep_local_state_comment" => local_state = Some(value.to_string()),
            "wsrep_cluster_status" => cluster_status = value.to_string(),
            "wsrep_cluster_size" => cluster_size = parse_number(key, value)?,
            "wsrep_local_index" => local_index = Some(value.to_string()),
            "wsrep_last_committed" => last_committed = Some(parse_number(key, value)?),
            "wsrep_last_applied" => last_applied = Some(parse_number(key, value)?),
            _ => {}
        }
    }

    if !seen_any {
        return Err(CollectError::QueryFailed(
            "wsrep status variables missing (possibly not a galera node)".to_string(),
        ));
    }

    let local_state = local_state.unwrap_or_default();
    Ok(NodeStatus {
        synced_state: SyncedState::from_state_comment(&local_state),
        local_state,
        cluster_size,
        cluster_status,
        read_only: false,
        local_index,
        last_committed: last_committed.or(last_applied),
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CollectError> {
    value
        .trim()
        .parse()
        .map_err(|_| CollectError::QueryFailed(format!("{} is not a number: {:?}", key, value)))
}

fn parse_on_off(value: &str) -> bool {
    value.eq_ignore_ascii_case("on") || value.trim() == "1"
}

fn query_failed(e: sqlx::Error) -> CollectError {
    CollectError::QueryFailed(e.to_string())
}

fn classify_connect_error(e: sqlx::Error) -> CollectError {
    match &e {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => CollectError::Unreachable(e.to_string()),
        sqlx::Error::Database(db) if is_access_denied(db.as_ref()) => {
            CollectError::AuthFailed(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut => CollectError::Timeout(e.to_string()),
        _ => CollectError::Unreachable(e.to_string()),
    }
}

fn is_access_denied(db: &dyn DatabaseError) -> bool {
    if let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>() {
        return mysql.number() == ER_ACCESS_DENIED;
    }
    db.code().as_deref() == Some("28000")
}
