/// Low-level host facts the readers need. Obtained once per process with
/// [`detect_host`] and passed by reference from then on.
pub trait HostInfo {
    /// Kernel clock ticks per second (`USER_HZ`).
    fn clock_ticks_per_second(&self) -> u64;
    fn page_size(&self) -> u64;
    /// Logical CPUs, at least 1.
    fn logical_cores(&self) -> usize;
    /// Resolve a uid through the system user database.
    fn user_name(&self, uid: u32) -> Option<String>;
}

/// Fixed host facts, for tests and replaying captured proc trees.
#[derive(Debug, Clone)]
pub struct StaticHost {
    pub clock_ticks: u64,
    pub page_size: u64,
    pub cores: usize,
    pub users: Vec<(u32, String)>,
}

impl Default for StaticHost {
    fn default() -> Self {
        StaticHost {
            clock_ticks: 100,
            page_size: 4096,
            cores: 1,
            users: vec![(0, "root".to_string())],
        }
    }
}

impl HostInfo for StaticHost {
    fn clock_ticks_per_second(&self) -> u64 {
        self.clock_ticks
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn logical_cores(&self) -> usize {
        self.cores.max(1)
    }

    fn user_name(&self, uid: u32) -> Option<String> {
        self.users
            .iter()
            .find(|(id, _)| *id == uid)
            .map(|(_, name)| name.clone())
    }
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(not(target_os = "linux"))]
use fallback as platform_impl;

pub type Host = platform_impl::Platform;

pub fn detect_host() -> Host {
    platform_impl::Platform::detect()
}
