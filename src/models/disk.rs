// Per-mount disk readings

use serde::{Deserialize, Serialize};

use super::BYTES_PER_GB;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub used_gb: f64,
    pub free_gb: f64,
    pub total_gb: f64,
    pub pct: f64,
}

impl DiskUsage {
    pub fn from_bytes(used: u64, free: u64, total: u64, pct: f64) -> Self {
        Self {
            used_gb: used as f64 / BYTES_PER_GB,
            free_gb: free as f64 / BYTES_PER_GB,
            total_gb: total as f64 / BYTES_PER_GB,
            pct,
        }
    }
}

/// One monitored mount. `usage` is `None` when the mount could not be read this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskReading {
    pub mount_path: String,
    pub display_name: String,
    pub usage: Option<DiskUsage>,
}

impl DiskReading {
    pub fn new(mount_path: &str, usage: Option<DiskUsage>) -> Self {
        Self {
            mount_path: mount_path.to_string(),
            display_name: display_name(mount_path),
            usage,
        }
    }
}

/// `/` stays as is; any other mount is shown by its last path component.
pub fn display_name(mount_path: &str) -> String {
    if mount_path == "/" {
        return "/".into();
    }
    mount_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(mount_path)
        .to_string()
}
