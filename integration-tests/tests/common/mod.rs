use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use mysql_diag::config::{
    CanaryConfig, ClusterConfig, DiskAgentConfig, GaleraAgentConfig, MysqlConfig, NodeConfig,
    QuorumConfig, ThresholdConfig, TimeoutConfig, TlsConfig,
};
use mysql_diag_agent::{create_router, AppState};

pub const HOSTS: [&str; 3] = ["127.0.0.1", "127.0.0.2", "127.0.0.3"];
pub const AGENT_USER: &str = "agent";
pub const AGENT_PASSWORD: &str = "agent-secret";

/// Find a free TCP port by binding to port 0
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port 0");
    listener.local_addr().unwrap().port()
}

/// A port on `host` that refuses connections
pub fn closed_port(host: &str) -> u16 {
    let listener = TcpListener::bind((host, 0)).expect("Failed to bind to port 0");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Bind the same port on every host. Agents share one port across the cluster.
pub async fn bind_shared_port(hosts: &[&str]) -> (u16, Vec<tokio::net::TcpListener>) {
    for _ in 0..20 {
        let port = find_free_port();
        let mut listeners = Vec::new();
        for host in hosts {
            match tokio::net::TcpListener::bind((*host, port)).await {
                Ok(l) => listeners.push(l),
                Err(_) => break,
            }
        }
        if listeners.len() == hosts.len() {
            return (port, listeners);
        }
    }
    panic!("Could not bind one port on all of {:?}", hosts);
}

pub fn serve(listener: tokio::net::TcpListener, router: Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    })
}

/// Accepts TCP connections and never writes a byte.
pub async fn silent_listener(host: &str) -> u16 {
    let listener = tokio::net::TcpListener::bind((host, 0))
        .await
        .expect("Failed to bind silent listener");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    port
}

fn authorized(headers: &HeaderMap) -> bool {
    // base64("agent:agent-secret")
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Basic YWdlbnQ6YWdlbnQtc2VjcmV0")
}

/// What a mock galera agent answers on `/sequence_number`.
#[derive(Debug, Clone, Copy)]
pub enum SeqnoReply {
    Bare(i64),
    Detailed(i64),
    Fail,
}

fn galera_agent_router(reply: SeqnoReply) -> Router {
    Router::new().route(
        "/sequence_number",
        get(move |headers: HeaderMap| async move {
            if !authorized(&headers) {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            match reply {
                SeqnoReply::Bare(n) => Json(serde_json::json!(n)).into_response(),
                SeqnoReply::Detailed(n) => Json(serde_json::json!({
                    "sequence_number": n,
                    "timestamp": "2024-01-01T00:00:00Z",
                }))
                .into_response(),
                SeqnoReply::Fail => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "grastate.dat unreadable").into_response()
                }
            }
        }),
    )
}

/// Start one mock galera agent per reply, on `HOSTS[i]`, all on the returned port.
pub async fn start_galera_agents(replies: &[SeqnoReply]) -> u16 {
    let (port, listeners) = bind_shared_port(&HOSTS[..replies.len()]).await;
    for (listener, reply) in listeners.into_iter().zip(replies) {
        serve(listener, galera_agent_router(*reply));
    }
    port
}

/// Start the real disk agent router on each host, reporting `dirs[i]` for
/// both disks.
pub async fn start_disk_agents(dirs: &[&Path]) -> u16 {
    let (port, listeners) = bind_shared_port(&HOSTS[..dirs.len()]).await;
    for (listener, dir) in listeners.into_iter().zip(dirs) {
        let state = Arc::new(AppState {
            username: AGENT_USER.to_string(),
            password: AGENT_PASSWORD.to_string(),
            persistent_disk_path: dir.to_path_buf(),
            ephemeral_disk_path: dir.to_path_buf(),
        });
        serve(listener, create_router(state));
    }
    port
}

pub async fn start_canary(healthy: bool) -> u16 {
    let (port, mut listeners) = bind_shared_port(&HOSTS[..1]).await;
    let router = Router::new().route(
        "/api/v1/status",
        get(move |headers: HeaderMap| async move {
            if !authorized(&headers) {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            Json(serde_json::json!({ "healthy": healthy })).into_response()
        }),
    );
    serve(listeners.remove(0), router);
    port
}

/// A cluster whose MySQL endpoints are given per node. No agents configured.
pub fn cluster_config(mysql_ports: &[u16]) -> ClusterConfig {
    let nodes = mysql_ports
        .iter()
        .enumerate()
        .map(|(i, port)| NodeConfig::new("mysql", &i.to_string(), HOSTS[i]).with_port(*port))
        .collect();

    ClusterConfig {
        mysql: MysqlConfig {
            username: "diag".to_string(),
            password: "diag-secret".to_string(),
            port: 3306,
            agent: None,
            threshold: ThresholdConfig::default(),
            nodes,
        },
        galera_agent: None,
        canary: None,
        timeouts: TimeoutConfig {
            connect_secs: 2,
            query_secs: 2,
            agent_secs: 5,
            disk_agent_secs: 5,
            run_secs: 30,
        },
        quorum: QuorumConfig::default(),
    }
}

/// Three nodes whose MySQL ports refuse connections.
pub fn all_down_config() -> ClusterConfig {
    let ports: Vec<u16> = HOSTS.iter().map(|h| closed_port(h)).collect();
    cluster_config(&ports)
}

pub fn galera_agent(port: u16) -> GaleraAgentConfig {
    GaleraAgentConfig {
        username: AGENT_USER.to_string(),
        password: AGENT_PASSWORD.to_string(),
        api_port: port,
        tls: TlsConfig::default(),
    }
}

pub fn disk_agent(port: u16) -> DiskAgentConfig {
    DiskAgentConfig {
        username: AGENT_USER.to_string(),
        password: AGENT_PASSWORD.to_string(),
        port,
        tls: TlsConfig::default(),
    }
}

pub fn canary(port: u16) -> CanaryConfig {
    CanaryConfig {
        username: AGENT_USER.to_string(),
        password: AGENT_PASSWORD.to_string(),
        api_port: port,
        host: HOSTS[0].to_string(),
    }
}

/// How a scripted MySQL server answers after its handshake.
#[derive(Debug, Clone, Copy)]
pub enum MysqlReply {
    /// ERR packet in answer to the login.
    RejectLogin {
        code: u16,
        sql_state: &'static str,
        message: &'static str,
    },
    /// Accept the login and session setup, fail every prepared statement.
    FailStatements {
        code: u16,
        sql_state: &'static str,
        message: &'static str,
    },
}

const CLIENT_LONG_PASSWORD: u32 = 1;
const CLIENT_CONNECT_WITH_DB: u32 = 8;
const CLIENT_PROTOCOL_41: u32 = 512;
const CLIENT_TRANSACTIONS: u32 = 8192;
const CLIENT_SECURE_CONNECTION: u32 = 32768;
const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;

const COM_QUIT: u8 = 0x01;
const COM_STMT_PREPARE: u8 = 0x16;
const COM_STMT_CLOSE: u8 = 0x19;

async fn write_packet(
    stream: &mut tokio::net::TcpStream,
    seq: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = (payload.len() as u32).to_le_bytes();
    let mut frame = vec![len[0], len[1], len[2], seq];
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await
}

async fn read_packet(stream: &mut tokio::net::TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((header[3], payload))
}

/// Protocol v10 greeting without CLIENT_SSL, so a preferred-TLS client stays plaintext.
fn handshake_v10() -> Vec<u8> {
    let capabilities = CLIENT_LONG_PASSWORD
        | CLIENT_CONNECT_WITH_DB
        | CLIENT_PROTOCOL_41
        | CLIENT_TRANSACTIONS
        | CLIENT_SECURE_CONNECTION
        | CLIENT_PLUGIN_AUTH;
    let caps = capabilities.to_le_bytes();

    let mut p = vec![10];
    p.extend_from_slice(b"8.0.36-galera\0");
    p.extend_from_slice(&7u32.to_le_bytes());
    p.extend_from_slice(b"abcdefgh");
    p.push(0);
    p.extend_from_slice(&caps[..2]);
    p.push(0x21);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&caps[2..]);
    p.push(21);
    p.extend_from_slice(&[0; 10]);
    p.extend_from_slice(b"ijklmnopqrst\0");
    p.extend_from_slice(b"mysql_native_password\0");
    p
}

fn ok_packet() -> Vec<u8> {
    vec![0x00, 0, 0, 2, 0, 0, 0]
}

fn err_packet(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut p = vec![0xff];
    p.extend_from_slice(&code.to_le_bytes());
    p.push(b'#');
    p.extend_from_slice(sql_state.as_bytes());
    p.extend_from_slice(message.as_bytes());
    p
}

async fn run_mysql_session(
    mut stream: tokio::net::TcpStream,
    reply: MysqlReply,
) -> std::io::Result<()> {
    write_packet(&mut stream, 0, &handshake_v10()).await?;
    let (seq, _login) = read_packet(&mut stream).await?;

    let (code, sql_state, message) = match reply {
        MysqlReply::RejectLogin {
            code,
            sql_state,
            message,
        } => {
            let err = err_packet(code, sql_state, message);
            return write_packet(&mut stream, seq.wrapping_add(1), &err).await;
        }
        MysqlReply::FailStatements {
            code,
            sql_state,
            message,
        } => (code, sql_state, message),
    };
    write_packet(&mut stream, seq.wrapping_add(1), &ok_packet()).await?;

    loop {
        let (seq, command) = read_packet(&mut stream).await?;
        match command.first().copied() {
            Some(COM_QUIT) | None => return Ok(()),
            Some(COM_STMT_CLOSE) => {}
            Some(COM_STMT_PREPARE) => {
                let err = err_packet(code, sql_state, message);
                write_packet(&mut stream, seq.wrapping_add(1), &err).await?;
            }
            Some(_) => write_packet(&mut stream, seq.wrapping_add(1), &ok_packet()).await?,
        }
    }
}

/// Serve scripted MySQL sessions on `host`, one per accepted connection.
pub async fn start_mysql_server(host: &str, reply: MysqlReply) -> u16 {
    let listener = tokio::net::TcpListener::bind((host, 0))
        .await
        .expect("Failed to bind mysql listener");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = run_mysql_session(stream, reply).await;
            });
        }
    });
    port
}
