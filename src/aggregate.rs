// Merge per-pid samples by process name and derive the ranked views.

use std::collections::{BTreeSet, HashMap};

use crate::models::{ProcessAgg, RawProcess};

/// Grouped and sorted result of one process enumeration.
///
/// Both views are cut from the same list, so the energy-impact breakdown and the
/// process table always agree with each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessTable {
    groups: Vec<ProcessAgg>,
}

impl ProcessTable {
    /// Groups by exact name, sums CPU, and sorts descending by the sum.
    ///
    /// The sort is stable: groups with equal CPU keep the order in which their name was
    /// first seen in `raw`. The OS enumeration order is not defined, so neither is the
    /// order among equal values.
    pub fn from_raw(raw: &[RawProcess]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(raw.len());
        let mut groups: Vec<ProcessAgg> = Vec::new();
        for p in raw {
            let i = *index.entry(p.name.as_str()).or_insert_with(|| {
                groups.push(ProcessAgg {
                    name: p.name.clone(),
                    cpu_pct: 0.0,
                    pids: BTreeSet::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[i];
            group.cpu_pct += p.cpu_pct;
            group.pids.insert(p.pid);
        }
        groups.sort_by(|a, b| b.cpu_pct.total_cmp(&a.cpu_pct));
        Self { groups }
    }

    pub fn groups(&self) -> &[ProcessAgg] {
        &self.groups
    }

    /// Groups with any CPU use, truncated to `n`.
    pub fn top(&self, n: usize) -> Vec<ProcessAgg> {
        self.above(0.0, n)
    }

    /// Groups with CPU strictly above `min_cpu_pct`, truncated to `cap`.
    pub fn process_list(&self, min_cpu_pct: f64, cap: usize) -> Vec<ProcessAgg> {
        self.above(min_cpu_pct, cap)
    }

    fn above(&self, min_cpu_pct: f64, cap: usize) -> Vec<ProcessAgg> {
        self.groups
            .iter()
            .filter(|g| g.cpu_pct > min_cpu_pct)
            .take(cap)
            .cloned()
            .collect()
    }
}

/// Fraction of the combined CPU each entry accounts for; empty when the total is zero.
pub fn energy_shares(top: &[ProcessAgg]) -> Vec<f64> {
    let total: f64 = top.iter().map(|p| p.cpu_pct).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    top.iter().map(|p| p.cpu_pct / total).collect()
}
