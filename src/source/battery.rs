// Battery state: /sys/class/power_supply on Linux, `pmset -g batt` on macOS.

use std::path::Path;

use crate::models::BatteryReading;

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(super) const SYSFS_POWER_SUPPLY: &str = "/sys/class/power_supply";

/// First battery under a power_supply directory (Linux). `None` on desktops.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(super) fn read_sysfs(root: &Path) -> Option<BatteryReading> {
    let mut entries: Vec<_> = std::fs::read_dir(root).ok()?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let dir = entry.path();
        let is_battery = read_trimmed(&dir.join("type")).as_deref() == Some("Battery")
            || entry.file_name().to_string_lossy().starts_with("BAT");
        if !is_battery {
            continue;
        }
        let Some(capacity) = read_trimmed(&dir.join("capacity")) else {
            continue;
        };
        let status = read_trimmed(&dir.join("status")).unwrap_or_default();
        // Energy counters (µWh, µW) when present, charge counters (µAh, µA) otherwise.
        let (now, rate) = match read_trimmed(&dir.join("energy_now")) {
            Some(energy) => (Some(energy), read_trimmed(&dir.join("power_now"))),
            None => (
                read_trimmed(&dir.join("charge_now")),
                read_trimmed(&dir.join("current_now")),
            ),
        };
        return parse_sysfs_battery(&capacity, &status, now.as_deref(), rate.as_deref());
    }
    None
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Builds a reading from sysfs attribute values. Anything but "Discharging" counts as
/// plugged in; remaining time is only estimated while discharging.
pub fn parse_sysfs_battery(
    capacity: &str,
    status: &str,
    now: Option<&str>,
    rate: Option<&str>,
) -> Option<BatteryReading> {
    let pct: f64 = capacity.trim().parse().ok()?;
    let plugged = !status.trim().eq_ignore_ascii_case("discharging");
    let secs_left = if plugged {
        None
    } else {
        remaining_secs(now, rate)
    };
    Some(BatteryReading {
        pct: pct.clamp(0.0, 100.0),
        plugged,
        secs_left,
    })
}

fn remaining_secs(now: Option<&str>, rate: Option<&str>) -> Option<u64> {
    let now: f64 = now?.trim().parse().ok()?;
    let rate: f64 = rate?.trim().parse().ok().filter(|r: &f64| *r > 0.0)?;
    Some((now / rate * 3600.0) as u64)
}

/// Parses `pmset -g batt`. `None` when no internal battery is listed.
pub fn parse_pmset(out: &str) -> Option<BatteryReading> {
    let line = out.lines().find(|l| l.contains("InternalBattery"))?;
    let pct_end = line.find('%')?;
    let pct_start = line[..pct_end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let pct: f64 = line[pct_start..pct_end].parse().ok()?;

    let fields: Vec<&str> = line[pct_end + 1..]
        .split(';')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    let state = fields.first().copied().unwrap_or_default();
    let plugged = out.contains("'AC Power'")
        || matches!(state, "charging" | "charged" | "finishing charge" | "AC attached");

    let secs_left = if plugged {
        None
    } else {
        fields
            .iter()
            .find(|f| f.contains("remaining"))
            .and_then(|f| f.split_whitespace().next())
            .and_then(parse_hours_minutes)
    };

    Some(BatteryReading {
        pct: pct.clamp(0.0, 100.0),
        plugged,
        secs_left,
    })
}

fn parse_hours_minutes(s: &str) -> Option<u64> {
    let (h, m) = s.split_once(':')?;
    let h: u64 = h.parse().ok()?;
    let m: u64 = m.parse().ok()?;
    Some(h * 3600 + m * 60)
}
