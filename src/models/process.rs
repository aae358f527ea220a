// Raw and name-merged process samples

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One OS process as returned by a single enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    /// CPU % since the previous enumeration; may exceed 100 on multi-core hosts.
    pub cpu_pct: f64,
}

impl RawProcess {
    pub fn new(pid: u32, name: impl Into<String>, cpu_pct: f64) -> Self {
        Self {
            pid,
            name: name.into(),
            cpu_pct,
        }
    }
}

/// All processes sharing a name, merged. Identity is the name, not the pid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAgg {
    pub name: String,
    pub cpu_pct: f64,
    pub pids: BTreeSet<u32>,
}
