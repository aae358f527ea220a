// Severity tiers for percentage metrics

use serde::{Deserialize, Serialize};

/// Below this a metric is Normal.
pub const WARNING_AT: f64 = 60.0;
/// At or above this a metric is Critical.
pub const CRITICAL_AT: f64 = 85.0;

/// Battery above this is Normal.
pub const BATTERY_NORMAL_ABOVE: f64 = 40.0;
/// Battery above this (and not above `BATTERY_NORMAL_ABOVE`) is Warning.
pub const BATTERY_WARNING_ABOVE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Normal,
    Warning,
    Critical,
}

/// Generic load tier: higher is worse.
pub fn classify(pct: f64) -> Tier {
    if pct < WARNING_AT {
        Tier::Normal
    } else if pct < CRITICAL_AT {
        Tier::Warning
    } else {
        Tier::Critical
    }
}

/// Battery charge tier: lower is worse.
pub fn battery_tier(pct: f64) -> Tier {
    if pct > BATTERY_NORMAL_ABOVE {
        Tier::Normal
    } else if pct > BATTERY_WARNING_ABOVE {
        Tier::Warning
    } else {
        Tier::Critical
    }
}
