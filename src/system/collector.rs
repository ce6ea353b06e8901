use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

use super::cpu::{capture_snapshot, compute_snapshot_usages};
use super::platform::{self, Host, HostInfo};
use super::process::ProcessInfo;
use super::procfs::{Pid, ProcFs};
use super::resources::{ClassifierRules, ResourceReport, list_open_resources};
use super::sampler::SamplerState;
use super::snapshot::{ResourceListing, SkippedProcess, SystemSnapshot};
use super::sockets::{SocketTable, build_socket_table};
use super::sweep::{Sweep, SweepControl};
use crate::config::Config;
use crate::error::Result;
use crate::format::ticks_to_seconds;

/// Owns the reader, the host capability and the sampler state. One owner
/// drives it; nothing here is shared between threads.
pub struct Collector<H: HostInfo = Host> {
    procfs: ProcFs,
    host: H,
    sampler: SamplerState,
    rules: ClassifierRules,
    prune_exited: bool,
}

impl Collector<Host> {
    pub fn from_config(config: &Config) -> Self {
        Collector::new(ProcFs::new(&config.general.proc_root), platform::detect_host())
            .with_rules(config.resources.classifier_rules())
            .with_prune_exited(config.sampler.prune_exited)
    }
}

impl<H: HostInfo> Collector<H> {
    pub fn new(procfs: ProcFs, host: H) -> Self {
        Collector {
            procfs,
            host,
            sampler: SamplerState::new(),
            rules: ClassifierRules::default(),
            prune_exited: true,
        }
    }

    pub fn with_rules(mut self, rules: ClassifierRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_prune_exited(mut self, prune: bool) -> Self {
        self.prune_exited = prune;
        self
    }

    pub fn procfs(&self) -> &ProcFs {
        &self.procfs
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn sampler(&self) -> &SamplerState {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut SamplerState {
        &mut self.sampler
    }

    /// One monitoring tick of the stateful protocol over every live process.
    pub fn refresh(&mut self, control: &SweepControl) -> Result<SystemSnapshot> {
        let _refresh_span = tracing::debug_span!("collector.refresh").entered();

        let system_cpu_delta = self.sampler.update_system_delta(&self.procfs)?;
        let pids = self.procfs.enumerate_live_process_ids()?;

        let mut processes = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut complete = true;
        for &pid in &pids {
            if control.should_stop() {
                complete = false;
                break;
            }
            match self.collect_process(pid) {
                Ok(info) => {
                    processes.insert(pid, info);
                }
                Err(e) => {
                    trace!(pid, "skipping process: {e}");
                    skipped.push(SkippedProcess {
                        pid,
                        reason: e.kind(),
                    });
                }
            }
        }

        // A partial sweep has not seen every live pid, so pruning would be wrong.
        if self.prune_exited && complete {
            let removed = self.sampler.prune(&pids);
            if removed > 0 {
                debug!(removed, "pruned exited processes from sampler");
            }
        }

        Ok(SystemSnapshot {
            system_cpu_delta,
            logical_cores: self.host.logical_cores(),
            processes,
            skipped,
            complete,
        })
    }

    fn collect_process(&mut self, pid: Pid) -> Result<ProcessInfo> {
        let status = self.procfs.read_process_status(pid, &self.host)?;
        let sample = self.procfs.read_process_cpu_times(pid)?;
        let cpu_percent = self.sampler.observe_process(sample);
        let pages = match self.procfs.read_process_memory_pages(pid) {
            Ok(pages) => Some(pages),
            Err(e) => {
                trace!(pid, "no page count: {e}");
                None
            }
        };
        Ok(ProcessInfo {
            pid,
            status,
            user_ticks: sample.user_ticks,
            kernel_ticks: sample.kernel_ticks,
            cpu_seconds: ticks_to_seconds(
                sample.total_ticks(),
                self.host.clock_ticks_per_second(),
            ),
            cpu_percent,
            pages,
            memory_bytes: pages.map(|p| p.saturating_mul(self.host.page_size())),
        })
    }

    /// Stateless protocol: two snapshots `interval` apart, usages with the
    /// core-count multiplier. Leaves the sampler state alone.
    ///
    /// A timeout on `control` applies to each snapshot on its own; the sleep
    /// in between does not count against it.
    pub fn paired_usages(
        &self,
        interval: Duration,
        control: &SweepControl,
    ) -> Result<Sweep<BTreeMap<Pid, f64>>> {
        let before = capture_snapshot(&self.procfs, control)?;
        std::thread::sleep(interval);
        let after = capture_snapshot(&self.procfs, &control.rearm())?;
        Ok(Sweep {
            items: compute_snapshot_usages(
                &before.items,
                &after.items,
                self.host.logical_cores(),
            ),
            complete: before.complete && after.complete,
        })
    }

    pub fn socket_table(&self) -> SocketTable {
        build_socket_table(&self.procfs)
    }

    /// Classify one process against a freshly built socket table.
    pub fn open_resources(&self, pid: Pid) -> Result<ResourceReport> {
        let table = self.socket_table();
        list_open_resources(&self.procfs, pid, &table, &self.rules)
    }

    /// Classify every live process against one socket table. Per-process
    /// failures are reported as [`ResourceListing::Failed`].
    pub fn open_resources_all(
        &self,
        control: &SweepControl,
    ) -> Result<Sweep<Vec<ResourceListing>>> {
        let _span = tracing::debug_span!("collector.resources").entered();
        let pids = self.procfs.enumerate_live_process_ids()?;
        let table = self.socket_table();
        debug!(sockets = table.len(), processes = pids.len(), "classifying descriptors");

        let mut listings = Vec::with_capacity(pids.len());
        let mut complete = true;
        for pid in pids {
            if control.should_stop() {
                complete = false;
                break;
            }
            let listing = match list_open_resources(&self.procfs, pid, &table, &self.rules) {
                Ok(report) => ResourceListing::Listed(report),
                Err(e) => {
                    trace!(pid, "cannot list descriptors: {e}");
                    ResourceListing::failed(pid, &e)
                }
            };
            listings.push(listing);
        }
        Ok(Sweep {
            items: listings,
            complete,
        })
    }
}
