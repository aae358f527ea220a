// Tick pipeline tests against a scripted source

mod common;

use common::{FakeSource, Script, default_settings, disk};
use hostpanel::models::{BatteryReading, RawProcess};
use hostpanel::rate::{NetCounters, format_rate};
use hostpanel::scheduler::{MonitorState, TickSettings};
use std::collections::BTreeSet;
use tokio::time::{Duration, Instant};

fn state_for(source_mounts: &[&str]) -> MonitorState {
    MonitorState::new(
        default_settings(),
        30,
        source_mounts.iter().map(|m| m.to_string()).collect(),
    )
}

fn net(recv: u64) -> Option<NetCounters> {
    Some(NetCounters {
        bytes_recv: recv,
        bytes_sent: 0,
    })
}

#[tokio::test(start_paused = true)]
async fn two_ticks_one_second_apart_yield_download_rate() {
    let source = FakeSource::new(Script {
        net: net(1_000_000),
        ..Default::default()
    });
    let mut state = state_for(&[]);

    let first = state.tick(&source, 0).await.unwrap();
    assert_eq!(first.net_down_bps, 0.0);

    tokio::time::advance(Duration::from_secs(1)).await;
    source.update(|s| s.net = net(3_000_000));
    let second = state.tick(&source, 1000).await.unwrap();
    assert_eq!(second.net_down_bps, 2_000_000.0);
    assert_eq!(second.history.net_down.last().copied(), Some(100.0));
    assert_eq!(format_rate(second.net_down_bps), "1.9 MB/s");
}

#[tokio::test(start_paused = true)]
async fn rate_uses_time_between_counter_reads() {
    // GPU is polled on even ticks and takes 1.5 s, shifting when the counters are read.
    let source = FakeSource::new(Script {
        gpu: Some(30.0),
        gpu_delay: Some(Duration::from_millis(1500)),
        net_per_sec: Some(1_000_000),
        ..Default::default()
    });
    let mut state = state_for(&[]);
    let mut rates = Vec::new();
    for _ in 0..6 {
        let started = Instant::now();
        let sample = state.tick(&source, 0).await.unwrap();
        rates.push(sample.net_down_bps);
        tokio::time::sleep_until(started + Duration::from_secs(2)).await;
    }
    assert_eq!(rates[0], 0.0);
    for (i, rate) in rates.iter().enumerate().skip(1) {
        assert!(
            (rate - 1_000_000.0).abs() < 1.0,
            "tick {} reported {} B/s",
            i + 1,
            rate
        );
    }
}

#[tokio::test]
async fn merged_processes_fill_both_views() {
    let source = FakeSource::new(Script {
        processes: vec![
            RawProcess::new(1, "chrome", 12.0),
            RawProcess::new(2, "chrome", 8.0),
            RawProcess::new(3, "finder", 1.0),
        ],
        ..Default::default()
    });
    let mut state = state_for(&[]);
    let sample = state.tick(&source, 0).await.unwrap();

    let names: Vec<_> = sample.processes.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["chrome", "finder"]);
    assert_eq!(sample.processes[0].cpu_pct, 20.0);
    assert_eq!(sample.processes[0].pids, BTreeSet::from([1, 2]));
    assert_eq!(sample.processes[1].pids, BTreeSet::from([3]));
    assert_eq!(sample.top_processes, sample.processes);
    assert_eq!(state.processes(), sample.processes.as_slice());
}

#[tokio::test]
async fn gpu_is_polled_every_other_tick_and_cached_between() {
    let source = FakeSource::new(Script {
        gpu: Some(40.0),
        ..Default::default()
    });
    let mut state = state_for(&[]);

    let first = state.tick(&source, 0).await.unwrap();
    assert_eq!(first.gpu_pct, None);
    assert_eq!(source.gpu_calls(), 0);

    let second = state.tick(&source, 0).await.unwrap();
    assert_eq!(second.gpu_pct, Some(40.0));
    assert_eq!(source.gpu_calls(), 1);

    source.update(|s| s.gpu = Some(90.0));
    let third = state.tick(&source, 0).await.unwrap();
    assert_eq!(third.gpu_pct, Some(40.0));
    assert_eq!(source.gpu_calls(), 1);
    assert_eq!(third.history.gpu, [40.0, 40.0]);
}

#[tokio::test]
async fn failing_disk_does_not_affect_other_metrics() {
    let mut script = Script {
        mounts: vec!["/".into(), "/Volumes/Backup".into()],
        ..Default::default()
    };
    script.disks.insert("/".into(), Some(disk(50, 100)));
    script.disks.insert("/Volumes/Backup".into(), None);
    let source = FakeSource::new(script);
    let mut state = state_for(&["/", "/Volumes/Backup"]);

    let sample = state.tick(&source, 0).await.unwrap();
    assert_eq!(sample.cpu_pct, 10.0);
    assert_eq!(sample.disks.len(), 2);
    let root = sample.disks[0].usage.as_ref().unwrap();
    assert_eq!(root.pct, 50.0);
    assert_eq!(root.total_gb, 100.0);
    assert_eq!(sample.disks[1].display_name, "Backup");
    assert!(sample.disks[1].usage.is_none());
    assert_eq!(sample.history.disks.get("/").map(Vec::len), Some(1));
    assert!(!sample.history.disks.contains_key("/Volumes/Backup"));
}

#[tokio::test]
async fn cpu_failure_drops_the_tick() {
    let source = FakeSource::new(Script::default());
    let mut state = state_for(&[]);

    state.tick(&source, 0).await.unwrap();
    source.update(|s| s.cpu = None);
    assert!(state.tick(&source, 0).await.is_none());

    source.update(|s| s.cpu = Some(70.0));
    let sample = state.tick(&source, 0).await.unwrap();
    assert_eq!(sample.tick, 3);
    assert_eq!(sample.history.cpu, [10.0, 70.0]);
}

#[tokio::test]
async fn network_failure_reports_zero_rates() {
    let source = FakeSource::new(Script {
        net: None,
        ..Default::default()
    });
    let mut state = state_for(&[]);
    let sample = state.tick(&source, 0).await.unwrap();
    assert_eq!(sample.net_down_bps, 0.0);
    assert_eq!(sample.net_up_bps, 0.0);
}

#[tokio::test]
async fn battery_and_memory_are_passed_through() {
    let source = FakeSource::new(Script {
        battery: Some(BatteryReading {
            pct: 12.0,
            plugged: false,
            secs_left: Some(1800),
        }),
        ..Default::default()
    });
    let mut state = state_for(&[]);
    let sample = state.tick(&source, 42).await.unwrap();
    assert_eq!(sample.timestamp_ms, 42);
    assert_eq!(sample.ram_pct, 25.0);
    assert_eq!(sample.ram_used_gb, 4.0);
    assert_eq!(sample.ram_total_gb, 16.0);
    let battery = sample.battery.unwrap();
    assert_eq!(battery.status_label(), "~0:30 left");
}

#[tokio::test]
async fn history_keeps_only_the_last_capacity_values() {
    let source = FakeSource::new(Script::default());
    let mut state = MonitorState::new(default_settings(), 3, vec![]);
    let mut last = None;
    for i in 0..5 {
        source.update(|s| s.cpu = Some(i as f64));
        last = state.tick(&source, 0).await;
    }
    assert_eq!(last.unwrap().history.cpu, [2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn process_table_respects_threshold_and_cap() {
    let source = FakeSource::new(Script {
        processes: (1..=10)
            .map(|i| RawProcess::new(i, format!("p{}", i), i as f64))
            .chain(std::iter::once(RawProcess::new(99, "idle", 0.0)))
            .collect(),
        ..Default::default()
    });
    let settings = TickSettings {
        top_n: 3,
        max_rows: 5,
        ..default_settings()
    };
    let mut state = MonitorState::new(settings, 30, vec![]);
    let sample = state.tick(&source, 0).await.unwrap();
    assert_eq!(sample.top_processes.len(), 3);
    assert_eq!(sample.top_processes[0].name, "p10");
    assert_eq!(sample.processes.len(), 5);
    assert!(sample.processes.iter().all(|p| p.name != "idle"));
}

#[tokio::test]
async fn kill_signals_every_pid_of_the_group() {
    let source = FakeSource::new(Script {
        processes: vec![
            RawProcess::new(1, "chrome", 12.0),
            RawProcess::new(2, "chrome", 8.0),
            RawProcess::new(3, "finder", 1.0),
        ],
        ..Default::default()
    });
    let mut state = state_for(&[]);
    state.tick(&source, 0).await.unwrap();

    let report = state.kill_process_group(&source, 0).await.unwrap();
    assert_eq!(report.name, "chrome");
    assert_eq!(report.signalled, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(source.signalled(), [1, 2]);
}

#[tokio::test]
async fn kill_on_exited_pids_is_a_silent_no_op() {
    let source = FakeSource::new(Script {
        processes: vec![RawProcess::new(7, "worker", 5.0)],
        ..Default::default()
    });
    let mut state = state_for(&[]);
    state.tick(&source, 0).await.unwrap();
    source.exit(7);

    for _ in 0..2 {
        let report = state.kill_process_group(&source, 0).await.unwrap();
        assert_eq!(report.signalled, 0);
        assert_eq!(report.skipped, 1);
    }
    assert!(source.signalled().is_empty());
}

#[tokio::test]
async fn kill_out_of_range_is_none() {
    let source = FakeSource::new(Script {
        processes: vec![RawProcess::new(7, "worker", 5.0)],
        ..Default::default()
    });
    let mut state = state_for(&[]);
    assert!(state.kill_process_group(&source, 0).await.is_none());
    state.tick(&source, 0).await.unwrap();
    assert!(state.kill_process_group(&source, 1).await.is_none());
    assert!(source.signalled().is_empty());
}

#[tokio::test]
async fn dropped_tick_keeps_previous_kill_targets() {
    let source = FakeSource::new(Script {
        processes: vec![RawProcess::new(7, "worker", 5.0)],
        ..Default::default()
    });
    let mut state = state_for(&[]);
    state.tick(&source, 0).await.unwrap();

    source.update(|s| {
        s.cpu = None;
        s.processes = vec![RawProcess::new(8, "other", 50.0)];
    });
    assert!(state.tick(&source, 0).await.is_none());
    assert_eq!(state.processes()[0].name, "worker");
}

#[tokio::test(start_paused = true)]
async fn hung_disk_times_out_without_blocking_other_mounts() {
    let mounts = ["/", "/Volumes/NAS", "/Volumes/USB"];
    let mut script = Script {
        mounts: mounts.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    };
    for m in mounts {
        script.disks.insert(m.to_string(), Some(disk(10, 100)));
    }
    script
        .disk_delay
        .insert("/Volumes/NAS".to_string(), Duration::from_secs(60));
    let source = FakeSource::new(script);
    let mut state = state_for(&mounts);

    for _ in 0..2 {
        let started = Instant::now();
        let sample = state.tick(&source, 0).await.unwrap();
        let limit = default_settings().disk_timeout;
        assert!(started.elapsed() >= limit && started.elapsed() < limit * 2);
        assert!(sample.disks[0].usage.is_some());
        assert!(sample.disks[1].usage.is_none());
        assert!(sample.disks[2].usage.is_some());
        assert_eq!(sample.cpu_pct, 10.0);
    }
}
