// Fixed-capacity per-metric history used for charting and threshold context.

use std::collections::{BTreeMap, VecDeque};

use crate::models::HistorySnapshot;

/// Network percentages are relative to at least this many bytes/s.
pub const NET_PEAK_FLOOR_BPS: f64 = 1024.0;

/// FIFO with a fixed capacity; pushing onto a full buffer evicts the oldest value.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Contents oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

/// All history series of the monitor. Lives for the whole process.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    cpu: RingBuffer<f64>,
    ram: RingBuffer<f64>,
    gpu: RingBuffer<f64>,
    net_down: RingBuffer<f64>,
    /// Raw download rates backing the rolling peak.
    net_down_raw: RingBuffer<f64>,
    disks: BTreeMap<String, RingBuffer<f64>>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cpu: RingBuffer::new(capacity),
            ram: RingBuffer::new(capacity),
            gpu: RingBuffer::new(capacity),
            net_down: RingBuffer::new(capacity),
            net_down_raw: RingBuffer::new(capacity),
            disks: BTreeMap::new(),
        }
    }

    pub fn record_cpu(&mut self, pct: f64) {
        self.cpu.push(pct);
    }

    pub fn record_ram(&mut self, pct: f64) {
        self.ram.push(pct);
    }

    pub fn record_gpu(&mut self, pct: f64) {
        self.gpu.push(pct);
    }

    /// Records a download rate and returns it as a percentage of the recent peak
    /// (the current value included), which is what goes into the chart series.
    pub fn record_net_down(&mut self, down_bps: f64) -> f64 {
        self.net_down_raw.push(down_bps);
        let peak = self
            .net_down_raw
            .iter()
            .copied()
            .fold(NET_PEAK_FLOOR_BPS, f64::max);
        let pct = (down_bps / peak * 100.0).min(100.0);
        self.net_down.push(pct);
        pct
    }

    pub fn record_disk(&mut self, mount_path: &str, pct: f64) {
        let capacity = self.capacity;
        self.disks
            .entry(mount_path.to_string())
            .or_insert_with(|| RingBuffer::new(capacity))
            .push(pct);
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            cpu: self.cpu.to_vec(),
            ram: self.ram.to_vec(),
            gpu: self.gpu.to_vec(),
            net_down: self.net_down.to_vec(),
            disks: self
                .disks
                .iter()
                .map(|(mount, buf)| (mount.clone(), buf.to_vec()))
                .collect(),
        }
    }
}
