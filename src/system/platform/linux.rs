use sysinfo::{CpuRefreshKind, RefreshKind, System, Uid, Users};
use tracing::debug;

use super::HostInfo;

const DEFAULT_CLOCK_TICKS: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 4096;

pub struct Platform {
    clock_ticks: u64,
    page_size: u64,
    cores: usize,
    users: Users,
}

impl Platform {
    pub fn detect() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
        );
        let cores = sys.cpus().len().max(1);
        let clock_ticks = sysconf(libc::_SC_CLK_TCK).unwrap_or(DEFAULT_CLOCK_TICKS);
        let page_size = sysconf(libc::_SC_PAGESIZE).unwrap_or(DEFAULT_PAGE_SIZE);
        debug!(cores, clock_ticks, page_size, "detected host");
        Platform {
            clock_ticks,
            page_size,
            cores,
            users: Users::new_with_refreshed_list(),
        }
    }
}

fn sysconf(name: libc::c_int) -> Option<u64> {
    // sysconf only reads a configuration constant.
    let value = unsafe { libc::sysconf(name) };
    (value > 0).then_some(value as u64)
}

impl HostInfo for Platform {
    fn clock_ticks_per_second(&self) -> u64 {
        self.clock_ticks
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn logical_cores(&self) -> usize {
        self.cores
    }

    fn user_name(&self, uid: u32) -> Option<String> {
        let uid = Uid::try_from(uid as usize).ok()?;
        self.users
            .get_user_by_id(&uid)
            .map(|user| user.name().to_string())
    }
}
