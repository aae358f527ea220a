// Best-effort GPU utilisation via an external helper (ioreg on macOS, nvidia-smi elsewhere).

use std::process::Stdio;
use std::time::Duration;

use crate::config::GpuBackendKind;

use super::SourceError;

const IOREG_ARGS: &[&str] = &["-r", "-d", "1", "-w", "0", "-c", "AGXAccelerator"];
const NVIDIA_SMI_ARGS: &[&str] = &[
    "--query-gpu=utilization.gpu",
    "--format=csv,noheader,nounits",
];

/// Keys tried in order against the accelerator entry.
const IOREG_KEYS: &[&str] = &["\"Device Utilization %\"", "\"GPU Activity(%)\""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuBackend {
    Ioreg,
    NvidiaSmi,
    Disabled,
}

impl GpuBackend {
    pub fn from_config(kind: GpuBackendKind) -> Self {
        match kind {
            GpuBackendKind::Auto if cfg!(target_os = "macos") => GpuBackend::Ioreg,
            GpuBackendKind::Auto => GpuBackend::NvidiaSmi,
            GpuBackendKind::Ioreg => GpuBackend::Ioreg,
            GpuBackendKind::NvidiaSmi => GpuBackend::NvidiaSmi,
            GpuBackendKind::Off => GpuBackend::Disabled,
        }
    }

    /// Runs the helper under `limit`. Any failure (missing binary, timeout, no GPU
    /// entry, unparseable output) is reported as `None`.
    pub async fn query(self, limit: Duration) -> Option<f64> {
        let (program, args) = match self {
            GpuBackend::Ioreg => ("ioreg", IOREG_ARGS),
            GpuBackend::NvidiaSmi => ("nvidia-smi", NVIDIA_SMI_ARGS),
            GpuBackend::Disabled => return None,
        };
        match run_helper(program, args, limit, "gpu query").await {
            Ok(out) => {
                let value = if self == GpuBackend::Ioreg {
                    parse_ioreg_utilization(&out)
                } else {
                    parse_nvidia_smi_utilization(&out)
                };
                if value.is_none() {
                    tracing::debug!(
                        operation = "gpu_utilization",
                        program,
                        "no GPU utilisation in helper output"
                    );
                }
                value
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    operation = "gpu_utilization",
                    program,
                    "GPU query failed"
                );
                None
            }
        }
    }
}

/// Runs a short-lived helper and returns its stdout. The child is killed if `limit` passes.
pub(super) async fn run_helper(
    program: &str,
    args: &[&str],
    limit: Duration,
    what: &'static str,
) -> Result<String, SourceError> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let output = tokio::time::timeout(limit, cmd.output())
        .await
        .map_err(|_| SourceError::Timeout { what, after: limit })??;
    if !output.status.success() {
        return Err(SourceError::Unavailable(what));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Reads `"Device Utilization %" = N` (or the older `"GPU Activity(%)" = N`), capped at 100.
pub fn parse_ioreg_utilization(out: &str) -> Option<f64> {
    IOREG_KEYS.iter().find_map(|key| {
        let at = out.find(key)?;
        let rest = out[at + key.len()..].trim_start().strip_prefix('=')?.trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let value: u64 = digits.parse().ok()?;
        Some(value.min(100) as f64)
    })
}

/// First line of `nvidia-smi --query-gpu=utilization.gpu` (first GPU only).
pub fn parse_nvidia_smi_utilization(out: &str) -> Option<f64> {
    let line = out.lines().map(str::trim).find(|l| !l.is_empty())?;
    let value: f64 = line.parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}
