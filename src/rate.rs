// Network throughput from cumulative byte counters.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Cumulative counters since boot, summed over all interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetCounters {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetRates {
    pub down_bps: f64,
    pub up_bps: f64,
}

/// Baseline for the next rate computation. Empty until the first reading.
#[derive(Debug, Clone, Default)]
pub struct NetCounterState {
    prev: Option<(NetCounters, Instant)>,
}

impl NetCounterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rates since the previous reading, then moves the baseline to `current`.
    ///
    /// Zero on the first reading and when no time has elapsed. A direction whose
    /// counter went backwards (interface reset or removed) reports zero for this call.
    pub fn update(&mut self, current: NetCounters, now: Instant) -> NetRates {
        let rates = match self.prev {
            Some((prev, prev_ts)) => {
                let dt = now.saturating_duration_since(prev_ts).as_secs_f64();
                if dt > 0.0 {
                    NetRates {
                        down_bps: per_second(prev.bytes_recv, current.bytes_recv, dt),
                        up_bps: per_second(prev.bytes_sent, current.bytes_sent, dt),
                    }
                } else {
                    NetRates::default()
                }
            }
            None => NetRates::default(),
        };
        self.prev = Some((current, now));
        rates
    }

    pub fn baseline(&self) -> Option<NetCounters> {
        self.prev.map(|(c, _)| c)
    }
}

fn per_second(prev: u64, curr: u64, dt_secs: f64) -> f64 {
    match curr.checked_sub(prev) {
        Some(delta) => delta as f64 / dt_secs,
        None => 0.0,
    }
}

const KIB: f64 = 1024.0;
const MIB: f64 = 1_048_576.0;

/// Human-readable rate: B/s below 1 KiB/s, then KB/s, then MB/s (binary units).
pub fn format_rate(bps: f64) -> String {
    if bps >= MIB {
        format!("{:.1} MB/s", bps / MIB)
    } else if bps >= KIB {
        format!("{:.1} KB/s", bps / KIB)
    } else {
        format!("{:.0} B/s", bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn counters(recv: u64, sent: u64) -> NetCounters {
        NetCounters {
            bytes_recv: recv,
            bytes_sent: sent,
        }
    }

    #[test]
    fn first_reading_is_zero_and_sets_baseline() {
        let mut state = NetCounterState::new();
        let r = state.update(counters(500, 700), Instant::now());
        assert_eq!(r, NetRates::default());
        assert_eq!(state.baseline(), Some(counters(500, 700)));
    }

    #[test]
    fn rate_is_delta_over_elapsed() {
        let t0 = Instant::now();
        let mut state = NetCounterState::new();
        state.update(counters(1_000_000, 10_000), t0);
        let r = state.update(counters(3_000_000, 14_000), t0 + Duration::from_secs(2));
        assert_eq!(r.down_bps, 1_000_000.0);
        assert_eq!(r.up_bps, 2_000.0);
    }

    #[test]
    fn zero_elapsed_yields_zero_and_still_moves_baseline() {
        let t0 = Instant::now();
        let mut state = NetCounterState::new();
        state.update(counters(100, 100), t0);
        let r = state.update(counters(900, 900), t0);
        assert_eq!(r, NetRates::default());
        assert_eq!(state.baseline(), Some(counters(900, 900)));
    }

    #[test]
    fn counter_reset_reports_zero_for_that_direction() {
        let t0 = Instant::now();
        let mut state = NetCounterState::new();
        state.update(counters(5_000, 5_000), t0);
        let r = state.update(counters(1_000, 6_000), t0 + Duration::from_secs(1));
        assert_eq!(r.down_bps, 0.0);
        assert_eq!(r.up_bps, 1_000.0);
        assert_eq!(state.baseline(), Some(counters(1_000, 6_000)));

        let r = state.update(counters(3_000, 6_000), t0 + Duration::from_secs(2));
        assert_eq!(r.down_bps, 2_000.0);
    }

    #[test]
    fn rates_are_never_negative() {
        let t0 = Instant::now();
        let mut state = NetCounterState::new();
        let readings = [10, 50, 20, 20, 0, 400, 399];
        for (i, v) in readings.into_iter().enumerate() {
            let r = state.update(counters(v, v), t0 + Duration::from_millis(500 * i as u64));
            assert!(r.down_bps >= 0.0 && r.up_bps >= 0.0);
        }
    }

    #[test]
    fn format_rate_unit_ladder() {
        assert_eq!(format_rate(0.0), "0 B/s");
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(1023.0), "1023 B/s");
        assert_eq!(format_rate(1024.0), "1.0 KB/s");
        assert_eq!(format_rate(2048.0), "2.0 KB/s");
        assert_eq!(format_rate(2_097_152.0), "2.0 MB/s");
    }
}
