//! Point-in-time reads of the process-info pseudo-filesystem.
//!
//! Every read is a short open/read/close of one pseudo-file. Nothing here
//! keeps state between calls; the delta bookkeeping lives in
//! [`crate::system::sampler`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::cpu::CpuSample;
use super::platform::HostInfo;
use super::process::{ProcessStatus, parse_status};
use crate::error::{ProbeError, Result};

pub type Pid = u32;

/// Raw counter access used by both CPU protocols.
pub trait CounterSource {
    /// Sum of every field of the aggregate `cpu` line, in clock ticks.
    fn system_cpu_total(&self) -> Result<u64>;
    fn process_cpu_times(&self, pid: Pid) -> Result<CpuSample>;
    fn live_process_ids(&self) -> Result<BTreeSet<Pid>>;
}

/// Reader rooted at a procfs mount (normally `/proc`).
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProcFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pid_path(&self, pid: Pid, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }

    pub fn fd_dir(&self, pid: Pid) -> PathBuf {
        self.pid_path(pid, "fd")
    }

    pub fn net_table_path(&self, table: &str) -> PathBuf {
        self.root.join("net").join(table)
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| ProbeError::from_io(path, e))
    }

    pub fn read_system_cpu_total(&self) -> Result<u64> {
        let path = self.root.join("stat");
        let content = self.read(&path)?;
        parse_system_cpu_total(&content).map_err(|detail| ProbeError::malformed(&path, detail))
    }

    pub fn read_process_cpu_times(&self, pid: Pid) -> Result<CpuSample> {
        let path = self.pid_path(pid, "stat");
        let content = self.read(&path)?;
        parse_cpu_times(pid, &content).map_err(|detail| ProbeError::malformed(&path, detail))
    }

    /// Numeric entries of the proc root. Only an unreadable root is an error.
    pub fn enumerate_live_process_ids(&self) -> Result<BTreeSet<Pid>> {
        let entries = fs::read_dir(&self.root).map_err(|e| ProbeError::from_io(&self.root, e))?;
        let pids = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                name.parse::<Pid>().ok()
            })
            .collect();
        Ok(pids)
    }

    /// Total program size in pages (first field of `statm`).
    pub fn read_process_memory_pages(&self, pid: Pid) -> Result<u64> {
        let path = self.pid_path(pid, "statm");
        let content = self.read(&path)?;
        content
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| ProbeError::malformed(&path, "missing page count"))
    }

    pub fn read_process_status(&self, pid: Pid, host: &impl HostInfo) -> Result<ProcessStatus> {
        let path = self.pid_path(pid, "status");
        let content = self.read(&path)?;
        let mut status = parse_status(&content);
        if let Some(uid) = status.uid {
            status.user = Some(host.user_name(uid).unwrap_or_else(|| {
                trace!(uid, "uid not in user database");
                uid.to_string()
            }));
        }
        Ok(status)
    }
}

impl CounterSource for ProcFs {
    fn system_cpu_total(&self) -> Result<u64> {
        self.read_system_cpu_total()
    }

    fn process_cpu_times(&self, pid: Pid) -> Result<CpuSample> {
        self.read_process_cpu_times(pid)
    }

    fn live_process_ids(&self) -> Result<BTreeSet<Pid>> {
        self.enumerate_live_process_ids()
    }
}

/// `cpu  user nice system idle iowait irq softirq steal guest guest_nice`
pub fn parse_system_cpu_total(content: &str) -> std::result::Result<u64, String> {
    let line = content.lines().next().ok_or("empty stat file")?;
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some(label) if label.parse::<u64>().is_err() => {}
        _ => return Err("aggregate cpu line has no label".to_string()),
    }
    let mut total: u64 = 0;
    let mut seen = 0usize;
    for tok in fields {
        let v = tok
            .parse::<u64>()
            .map_err(|_| format!("non-numeric cpu field `{tok}`"))?;
        total = total.saturating_add(v);
        seen += 1;
    }
    if seen == 0 {
        return Err("aggregate cpu line has no counters".to_string());
    }
    Ok(total)
}

/// Extract utime/stime (fields 13 and 14) and starttime (field 21).
///
/// The comm field may contain spaces or parentheses, so fields are counted
/// after the last `)`: state is index 0 there, utime index 11.
pub fn parse_cpu_times(pid: Pid, content: &str) -> std::result::Result<CpuSample, String> {
    let rpar = content.rfind(')').ok_or("missing comm terminator")?;
    let fields: Vec<&str> = content[rpar + 1..].split_whitespace().collect();
    let field = |idx: usize, name: &str| -> std::result::Result<u64, String> {
        fields
            .get(idx)
            .ok_or_else(|| format!("missing {name}"))?
            .parse::<u64>()
            .map_err(|_| format!("non-numeric {name}"))
    };
    Ok(CpuSample {
        pid,
        user_ticks: field(11, "utime")?,
        kernel_ticks: field(12, "stime")?,
        start_time: field(19, "starttime").unwrap_or(0),
    })
}
