//! Stateless CPU accounting: samples, paired snapshots and the usage formula.
//!
//! Usage is derived from two readings of monotonically increasing tick
//! counters. A delta only means something when both readings describe the
//! same subject, so a process is identified by its pid *and* its start time;
//! a recycled pid shows up as a different subject and is never diffed
//! against its predecessor.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, trace};

use super::procfs::{CounterSource, Pid};
use super::sweep::{Sweep, SweepControl};
use crate::error::Result;
use crate::format::round_2;

/// User and kernel ticks of one process at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuSample {
    pub pid: Pid,
    pub user_ticks: u64,
    pub kernel_ticks: u64,
    /// Ticks after boot at which the process started.
    pub start_time: u64,
}

impl CpuSample {
    pub fn total_ticks(&self) -> u64 {
        self.user_ticks.saturating_add(self.kernel_ticks)
    }

    pub fn same_subject(&self, other: &CpuSample) -> bool {
        self.pid == other.pid && self.start_time == other.start_time
    }
}

/// System total plus every readable process, taken in one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuSnapshot {
    pub system_total: u64,
    pub processes: HashMap<Pid, CpuSample>,
}

/// Signed difference `after - before`. Negative when the counter went
/// backwards (pid reuse, clock irregularities).
pub fn tick_delta(before: u64, after: u64) -> i64 {
    (i128::from(after) - i128::from(before)).clamp(i128::from(i64::MIN), i128::from(i64::MAX))
        as i64
}

/// `100 * process_delta / system_delta * cores`, clamped to `[0, 100]`.
/// `None` when the system delta is not positive.
pub fn usage_percent(process_delta: i64, system_delta: i64, cores: usize) -> Option<f64> {
    if system_delta <= 0 {
        return None;
    }
    let raw = process_delta as f64 / system_delta as f64 * 100.0 * cores.max(1) as f64;
    Some(raw.clamp(0.0, 100.0))
}

/// Paired-snapshot protocol. Pids missing from either side, or whose start
/// time changed in between, are left out of the result.
pub fn compute_usages(
    system_before: u64,
    procs_before: &HashMap<Pid, CpuSample>,
    system_after: u64,
    procs_after: &HashMap<Pid, CpuSample>,
    cores: usize,
) -> BTreeMap<Pid, f64> {
    let system_delta = tick_delta(system_before, system_after);
    let mut usages = BTreeMap::new();
    if system_delta <= 0 {
        debug!(system_delta, "no system progress between snapshots");
        return usages;
    }
    for (pid, before) in procs_before {
        let Some(after) = procs_after.get(pid) else {
            continue;
        };
        if !before.same_subject(after) {
            trace!(pid, "pid recycled between snapshots");
            continue;
        }
        let delta = tick_delta(before.total_ticks(), after.total_ticks());
        if let Some(usage) = usage_percent(delta, system_delta, cores) {
            usages.insert(*pid, round_2(usage));
        }
    }
    usages
}

pub fn compute_snapshot_usages(
    before: &CpuSnapshot,
    after: &CpuSnapshot,
    cores: usize,
) -> BTreeMap<Pid, f64> {
    compute_usages(
        before.system_total,
        &before.processes,
        after.system_total,
        &after.processes,
        cores,
    )
}

/// Read the system total and then every live process. Processes that vanish
/// or cannot be read are skipped; only an unreadable system line or process
/// list fails the call.
pub fn capture_snapshot(
    source: &impl CounterSource,
    control: &SweepControl,
) -> Result<Sweep<CpuSnapshot>> {
    let system_total = source.system_cpu_total()?;
    let pids = source.live_process_ids()?;
    let mut processes = HashMap::with_capacity(pids.len());
    let mut complete = true;
    for pid in pids {
        if control.should_stop() {
            complete = false;
            break;
        }
        match source.process_cpu_times(pid) {
            Ok(sample) => {
                processes.insert(pid, sample);
            }
            Err(e) => trace!(pid, "skipping process: {e}"),
        }
    }
    Ok(Sweep {
        items: CpuSnapshot {
            system_total,
            processes,
        },
        complete,
    })
}
