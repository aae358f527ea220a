// Per-tick sample handed to presentation sinks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DiskReading, ProcessAgg};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReading {
    pub pct: f64,
    pub plugged: bool,
    pub secs_left: Option<u64>,
}

impl BatteryReading {
    /// "Charging" when plugged in, "~H:MM left" with a known estimate, "On Battery" otherwise.
    pub fn status_label(&self) -> String {
        if self.plugged {
            return "Charging".into();
        }
        match self.secs_left {
            Some(secs) if secs > 0 => {
                format!("~{}:{:02} left", secs / 3600, (secs % 3600) / 60)
            }
            _ => "On Battery".into(),
        }
    }
}

/// Ring buffer contents at the end of a tick, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub cpu: Vec<f64>,
    pub ram: Vec<f64>,
    pub gpu: Vec<f64>,
    /// Download rate as a percentage of the recent peak.
    pub net_down: Vec<f64>,
    pub disks: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Unix milliseconds when the tick started.
    pub timestamp_ms: u64,
    /// 1-based tick counter since startup.
    pub tick: u64,
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub gpu_pct: Option<f64>,
    pub battery: Option<BatteryReading>,
    pub net_down_bps: f64,
    pub net_up_bps: f64,
    pub disks: Vec<DiskReading>,
    /// Energy-impact breakdown (summed CPU > 0).
    pub top_processes: Vec<ProcessAgg>,
    /// Process table; kill indices refer to this list.
    pub processes: Vec<ProcessAgg>,
    pub history: HistorySnapshot,
}
