use super::HostInfo;

/// Hosts without procfs get the conventional Linux constants so that
/// captured proc trees can still be replayed.
pub struct Platform {
    cores: usize,
}

impl Platform {
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Platform { cores }
    }
}

impl HostInfo for Platform {
    fn clock_ticks_per_second(&self) -> u64 {
        100
    }

    fn page_size(&self) -> u64 {
        4096
    }

    fn logical_cores(&self) -> usize {
        self.cores
    }

    fn user_name(&self, _uid: u32) -> Option<String> {
        None
    }
}
