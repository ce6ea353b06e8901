use serde::Serialize;

use super::procfs::Pid;

/// Attributes read from `/proc/<pid>/status`. Kernel threads have no `Vm*`
/// lines, so every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessStatus {
    pub name: Option<String>,
    pub state: Option<String>,
    pub uid: Option<u32>,
    pub user: Option<String>,
    pub threads: Option<u32>,
    pub vm_size_kb: Option<u64>,
    pub vm_rss_kb: Option<u64>,
    pub vm_data_kb: Option<u64>,
    pub vm_stack_kb: Option<u64>,
    pub vm_exe_kb: Option<u64>,
}

/// Parse the colon-terminated key lines. Unknown keys are ignored and a
/// value that fails to parse leaves its field `None`. `user` is filled in by
/// the caller, which owns the user database.
pub fn parse_status(content: &str) -> ProcessStatus {
    let mut status = ProcessStatus::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => status.name = Some(value.to_string()),
            "State" => status.state = Some(value.split_whitespace().collect::<Vec<_>>().join(" ")),
            // Real, effective, saved, filesystem: the first one is reported.
            "Uid" => status.uid = first_number(value),
            "Threads" => status.threads = first_number(value),
            "VmSize" => status.vm_size_kb = first_number(value),
            "VmRSS" => status.vm_rss_kb = first_number(value),
            "VmData" => status.vm_data_kb = first_number(value),
            "VmStk" => status.vm_stack_kb = first_number(value),
            "VmExe" => status.vm_exe_kb = first_number(value),
            _ => {}
        }
    }
    status
}

fn first_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.split_whitespace().next()?.parse().ok()
}

/// One process in a full-system snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    #[serde(flatten)]
    pub status: ProcessStatus,
    pub user_ticks: u64,
    pub kernel_ticks: u64,
    pub cpu_seconds: f64,
    /// Stateful-protocol usage; 0 on the first observation.
    pub cpu_percent: f64,
    pub pages: Option<u64>,
    pub memory_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tpostgres\n\
Umask:\t0077\n\
State:\tS (sleeping)\n\
Tgid:\t812\n\
Uid:\t113\t113\t113\t113\n\
Gid:\t121\t121\t121\t121\n\
VmPeak:\t  220000 kB\n\
VmSize:\t  216492 kB\n\
VmRSS:\t   27340 kB\n\
VmData:\t    3020 kB\n\
VmStk:\t     132 kB\n\
VmExe:\t    6260 kB\n\
Threads:\t1\n";

    #[test]
    fn parses_recognized_keys() {
        let status = parse_status(STATUS);
        assert_eq!(status.name.as_deref(), Some("postgres"));
        assert_eq!(status.state.as_deref(), Some("S (sleeping)"));
        assert_eq!(status.uid, Some(113));
        assert_eq!(status.user, None);
        assert_eq!(status.threads, Some(1));
        assert_eq!(status.vm_size_kb, Some(216_492));
        assert_eq!(status.vm_rss_kb, Some(27_340));
        assert_eq!(status.vm_data_kb, Some(3020));
        assert_eq!(status.vm_stack_kb, Some(132));
        assert_eq!(status.vm_exe_kb, Some(6260));
    }

    #[test]
    fn kernel_thread_has_no_memory_lines() {
        let status = parse_status("Name:\tkworker/0:1\nState:\tI (idle)\nUid:\t0\t0\t0\t0\nThreads:\t1\n");
        assert_eq!(status.name.as_deref(), Some("kworker/0:1"));
        assert_eq!(status.vm_size_kb, None);
        assert_eq!(status.vm_rss_kb, None);
    }

    #[test]
    fn name_with_colon_keeps_full_value() {
        let status = parse_status("Name:\ttmux: server\n");
        assert_eq!(status.name.as_deref(), Some("tmux: server"));
    }
}
