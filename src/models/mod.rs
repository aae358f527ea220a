// Domain models handed from the sampling core to the panel

mod disk;
mod process;
mod sample;

pub use disk::{DiskReading, DiskUsage};
pub use process::{ProcessAgg, RawProcess};
pub use sample::{BatteryReading, HistorySnapshot, Sample};

/// Bytes per gibibyte; all `*_gb` fields use this divisor.
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;
