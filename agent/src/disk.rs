use std::path::Path;

use crate::error::AgentError;
use crate::types::DiskInfo;

/// Filesystem statistics for the filesystem holding `path`.
#[cfg(unix)]
pub fn get_disk_info(path: &Path) -> Result<DiskInfo, AgentError> {
    use nix::sys::statvfs::statvfs;

    let stat = statvfs(path).map_err(|e| AgentError::DiskStat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let block_size = stat.fragment_size() as u64;
    Ok(DiskInfo {
        bytes_total: (stat.blocks() as u64).saturating_mul(block_size),
        bytes_free: (stat.blocks_free() as u64).saturating_mul(block_size),
        inodes_total: stat.files() as u64,
        inodes_free: stat.files_free() as u64,
    })
}

#[cfg(not(unix))]
pub fn get_disk_info(path: &Path) -> Result<DiskInfo, AgentError> {
    Err(AgentError::DiskStat {
        path: path.to_path_buf(),
        reason: "statvfs is not supported on this platform".to_string(),
    })
}
