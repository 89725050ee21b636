use comfy_table::presets::ASCII_FULL;
use comfy_table::{ContentArrangement, Table};

use crate::types::{BootstrapDecision, CanaryStatus, DiskInfo, NodeDiskInfo, Snapshot};

const ERROR_CONTENT: &str = "N/A - ERROR";

fn short_identity(name: &str, uuid: &str) -> String {
    let uuid: String = uuid.chars().take(8).collect();
    if uuid.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", name, uuid)
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

fn percent(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    total.saturating_sub(free) as f64 / total as f64 * 100.0
}

fn describe_disk(info: &DiskInfo) -> String {
    format!(
        "{:.1}% of {} ({:.1}% of {:.2}M inodes)",
        percent(info.bytes_total, info.bytes_free),
        format_bytes(info.bytes_total),
        percent(info.inodes_total, info.inodes_free),
        info.inodes_total as f64 / 1_000_000.0
    )
}

fn disk_row(info: &NodeDiskInfo) -> (String, String) {
    match info.info() {
        Some(reading) => (
            describe_disk(&reading.persistent),
            describe_disk(&reading.ephemeral),
        ),
        None => (ERROR_CONTENT.to_string(), ERROR_CONTENT.to_string()),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(header);
    table
}

fn cluster_state_table(snapshot: &Snapshot) -> Table {
    let mut table = new_table(vec![
        "HOST",
        "NAME/UUID",
        "WSREP LOCAL STATE",
        "WSREP CLUSTER STATUS",
        "WSREP CLUSTER SIZE",
    ]);

    for status in &snapshot.node_cluster_statuses {
        let (state, cluster_status, size) = match status.status() {
            Some(s) => (
                s.local_state.clone(),
                s.cluster_status.clone(),
                s.cluster_size.to_string(),
            ),
            None => (
                ERROR_CONTENT.to_string(),
                ERROR_CONTENT.to_string(),
                ERROR_CONTENT.to_string(),
            ),
        };
        table.add_row(vec![
            status.node.host.clone(),
            short_identity(&status.node.name, &status.node.uuid),
            state,
            cluster_status,
            size,
        ]);
    }

    table
}

fn disk_info_table(snapshot: &Snapshot) -> Table {
    let mut table = new_table(vec![
        "HOST",
        "NAME/UUID",
        "PERSISTENT DISK USED",
        "EPHEMERAL DISK USED",
    ]);

    for info in &snapshot.node_disk_infos {
        let (persistent, ephemeral) = disk_row(info);
        table.add_row(vec![
            info.node.host.clone(),
            short_identity(&info.node.name, &info.node.uuid),
            persistent,
            ephemeral,
        ]);
    }

    table
}

/// Plain-text rendering of a snapshot for operators reading a terminal.
pub fn render_summary(snapshot: &Snapshot) -> String {
    let mut lines = vec![
        format!("Snapshot taken at {}", snapshot.taken_at),
        cluster_state_table(snapshot).to_string(),
    ];

    if !snapshot.node_disk_infos.is_empty() {
        lines.push(disk_info_table(snapshot).to_string());
    }

    match &snapshot.bootstrap {
        BootstrapDecision::NotNeeded { healthy_node } => {
            lines.push(format!("Bootstrap not necessary ({} is healthy)", healthy_node));
        }
        BootstrapDecision::Bootstrap { candidate, seqno } => {
            lines.push("[CRITICAL] You must bootstrap the cluster.".to_string());
            lines.push(format!(
                "[CRITICAL] Bootstrap node: \"{}\" (seqno {})",
                candidate, seqno
            ));
        }
        BootstrapDecision::ManualInvestigation => {
            lines.push("[CRITICAL] You must bootstrap the cluster.".to_string());
            lines.push(
                "[CRITICAL] No node reported a sequence number, inspect each node manually before choosing one."
                    .to_string(),
            );
        }
    }

    for issue in &snapshot.disk_space_issues {
        lines.push(format!(
            "[WARNING] {} disk usage is very high on node {}. Consider re-deploying with larger {} disks.",
            issue.disk_type, issue.node, issue.disk_type
        ));
    }

    match &snapshot.canary {
        CanaryStatus::Healthy => lines.push("Canary: healthy".to_string()),
        CanaryStatus::Unhealthy => {
            lines.push("[WARNING] Canary reports replication is unhealthy".to_string())
        }
        CanaryStatus::Unknown(reason) => lines.push(format!("Canary: unknown ({})", reason)),
        CanaryStatus::NotConfigured => {}
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
