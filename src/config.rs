use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::system::resources::ClassifierRules;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub sampler: SamplerConfig,
    pub resources: ResourcesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub proc_root: PathBuf,
    pub sample_interval_ms: u64,
    /// 0 disables the deadline.
    pub sweep_deadline_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            proc_root: PathBuf::from("/proc"),
            sample_interval_ms: 1000,
            sweep_deadline_ms: 0,
        }
    }
}

impl GeneralConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn sweep_deadline(&self) -> Option<Duration> {
        (self.sweep_deadline_ms > 0).then(|| Duration::from_millis(self.sweep_deadline_ms))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub prune_exited: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig { prune_exited: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub shm_dir: PathBuf,
    pub named_semaphore_prefix: String,
    pub anonymous_semaphore_marker: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        let rules = ClassifierRules::default();
        ResourcesConfig {
            shm_dir: PathBuf::from("/dev/shm"),
            named_semaphore_prefix: rules.named_semaphore_prefix,
            anonymous_semaphore_marker: rules.anonymous_semaphore_marker,
        }
    }
}

impl ResourcesConfig {
    pub fn classifier_rules(&self) -> ClassifierRules {
        ClassifierRules {
            named_semaphore_prefix: self.named_semaphore_prefix.clone(),
            anonymous_semaphore_marker: self.anonymous_semaphore_marker.clone(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procsight").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
            warn!("ignoring invalid config {}: {e}", path.display());
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
