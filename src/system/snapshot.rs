use std::collections::BTreeMap;

use serde::Serialize;

use super::process::ProcessInfo;
use super::procfs::Pid;
use super::resources::ResourceReport;
use crate::error::{FailureKind, ProbeError};

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    /// System-wide tick delta since the previous refresh; 0 on the first.
    pub system_cpu_delta: i64,
    pub logical_cores: usize,
    pub processes: BTreeMap<Pid, ProcessInfo>,
    /// Processes that were listed but could not be read.
    pub skipped: Vec<SkippedProcess>,
    /// False when the sweep was cancelled or ran past its deadline.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedProcess {
    pub pid: Pid,
    pub reason: FailureKind,
}

/// Outcome of classifying one process during a full-system sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceListing {
    Listed(ResourceReport),
    Failed {
        pid: Pid,
        error: FailureKind,
        detail: String,
    },
}

impl ResourceListing {
    pub fn failed(pid: Pid, err: &ProbeError) -> Self {
        ResourceListing::Failed {
            pid,
            error: err.kind(),
            detail: err.to_string(),
        }
    }

    pub fn pid(&self) -> Pid {
        match self {
            ResourceListing::Listed(report) => report.pid,
            ResourceListing::Failed { pid, .. } => *pid,
        }
    }
}
