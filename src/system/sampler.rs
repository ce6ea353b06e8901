//! Stateful incremental CPU protocol, one call per monitoring tick.
//!
//! Call [`SamplerState::update_system_delta`] once per tick, then
//! [`SamplerState::usage_for_process`] for each pid of interest. The first
//! observation of any subject seeds the state and reports 0.
//!
//! This protocol has no core-count multiplier: the value is the process's
//! share of all ticks the system accumulated, so a process saturating one
//! core of four reports about 25. [`crate::system::cpu::compute_usages`]
//! applies the multiplier instead. Both never report a negative value.
//!
//! A delta is only taken between readings of consecutive ticks. A process
//! that was not read on the previous tick (partial sweep, transient read
//! failure) is reseeded and reports 0 for that tick.
//!
//! Entries are not evicted on their own; long-running callers should
//! [`prune`](SamplerState::prune) with the live pid set or
//! [`forget`](SamplerState::forget) pids they stop tracking. The state
//! assumes a single writer.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use super::cpu::{CpuSample, tick_delta};
use super::procfs::{CounterSource, Pid};
use crate::error::Result;
use crate::format::round_2;

#[derive(Debug, Default, Clone)]
pub struct SamplerState {
    last_system_total: Option<u64>,
    last_system_delta: i64,
    /// Number of system readings so far.
    tick: u64,
    last_process: HashMap<Pid, TrackedSample>,
}

#[derive(Debug, Clone, Copy)]
struct TrackedSample {
    sample: CpuSample,
    tick: u64,
}

impl SamplerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the system total and record the delta against the previous
    /// reading. The first call seeds the state and returns 0.
    pub fn update_system_delta(&mut self, source: &impl CounterSource) -> Result<i64> {
        let total = source.system_cpu_total()?;
        Ok(self.observe_system_total(total))
    }

    pub fn observe_system_total(&mut self, total: u64) -> i64 {
        let delta = match self.last_system_total.replace(total) {
            Some(previous) => tick_delta(previous, total),
            None => 0,
        };
        self.last_system_delta = delta;
        self.tick += 1;
        delta
    }

    /// Usage of `pid` since its previous observation. A process that cannot
    /// be read reports 0 and leaves the state untouched.
    pub fn usage_for_process(&mut self, source: &impl CounterSource, pid: Pid) -> f64 {
        match source.process_cpu_times(pid) {
            Ok(sample) => self.observe_process(sample),
            Err(e) => {
                trace!(pid, "no cpu sample: {e}");
                0.0
            }
        }
    }

    pub fn observe_process(&mut self, sample: CpuSample) -> f64 {
        let tracked = TrackedSample {
            sample,
            tick: self.tick,
        };
        let Some(TrackedSample {
            sample: previous,
            tick: previous_tick,
        }) = self.last_process.insert(sample.pid, tracked)
        else {
            return 0.0;
        };
        if !previous.same_subject(&sample) {
            trace!(pid = sample.pid, "pid recycled, reseeding");
            return 0.0;
        }
        if previous_tick + 1 != self.tick {
            trace!(
                pid = sample.pid,
                previous_tick,
                tick = self.tick,
                "not read on the previous tick, reseeding"
            );
            return 0.0;
        }
        if self.last_system_delta <= 0 {
            return 0.0;
        }
        let delta = tick_delta(previous.total_ticks(), sample.total_ticks());
        let usage = delta as f64 / self.last_system_delta as f64 * 100.0;
        round_2(usage.max(0.0))
    }

    pub fn last_system_delta(&self) -> i64 {
        self.last_system_delta
    }

    pub fn tracked_processes(&self) -> usize {
        self.last_process.len()
    }

    pub fn is_tracking(&self, pid: Pid) -> bool {
        self.last_process.contains_key(&pid)
    }

    /// Drop the remembered sample for `pid`. Returns whether one existed.
    pub fn forget(&mut self, pid: Pid) -> bool {
        self.last_process.remove(&pid).is_some()
    }

    /// Keep only pids in `live`; returns how many entries were removed.
    pub fn prune(&mut self, live: &BTreeSet<Pid>) -> usize {
        let before = self.last_process.len();
        self.last_process.retain(|pid, _| live.contains(pid));
        before - self.last_process.len()
    }
}
