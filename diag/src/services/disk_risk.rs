use crate::config::ThresholdConfig;
use crate::types::{DiskInfo, DiskSpaceIssue, DiskType, NodeDiskInfo};

/// Fraction of `total` that is in use, or `None` when `total` is zero.
pub fn used_fraction(total: u64, free: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(free);
    Some(used as f64 / total as f64)
}

/// Flag every disk whose byte or inode usage is strictly above its threshold.
///
/// Nodes without a successful reading are skipped: a missing reading is a
/// collection error, not an empty disk.
pub fn check_disk_capacity(infos: &[NodeDiskInfo], threshold: &ThresholdConfig) -> Vec<DiskSpaceIssue> {
    let mut issues = Vec::new();

    for node_info in infos {
        let Some(info) = node_info.info() else {
            continue;
        };

        for (disk_type, disk) in [
            (DiskType::Ephemeral, &info.ephemeral),
            (DiskType::Persistent, &info.persistent),
        ] {
            if let Some(issue) = check_disk(&node_info.node.identity(), disk_type, disk, threshold) {
                issues.push(issue);
            }
        }
    }

    issues
}

fn check_disk(
    node: &str,
    disk_type: DiskType,
    disk: &DiskInfo,
    threshold: &ThresholdConfig,
) -> Option<DiskSpaceIssue> {
    let used = used_fraction(disk.bytes_total, disk.bytes_free)?;
    let inodes_used = used_fraction(disk.inodes_total, disk.inodes_free);

    let bytes_over = used > threshold.disk_used_warning_fraction;
    let inodes_over = inodes_used.is_some_and(|f| f > threshold.disk_inodes_used_warning_fraction);

    if !(bytes_over || inodes_over) {
        return None;
    }

    Some(DiskSpaceIssue {
        node: node.to_string(),
        disk_type,
        used_fraction: used,
        inodes_used_fraction: inodes_used,
    })
}
