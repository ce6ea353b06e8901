use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;

use crate::error::{ProbeError, Result};
use crate::format::permission_bits;

const SEMAPHORE_PREFIX: &str = "sem.";

/// A `sem_open` semaphore found in the shared-memory directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedSemaphore {
    /// Name without the `sem.` prefix, as passed to `sem_open`.
    pub name: String,
    pub path: PathBuf,
    pub inode: u64,
    /// Last three octal digits of the mode.
    pub permissions: String,
    pub size: u64,
}

/// List `sem.*` entries of `shm_dir`, sorted by name. Entries that vanish
/// while being listed are skipped.
pub fn list_named_semaphores(shm_dir: &Path) -> Result<Vec<NamedSemaphore>> {
    let entries = fs::read_dir(shm_dir).map_err(|e| ProbeError::from_io(shm_dir, e))?;
    let mut semaphores = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name
            .to_str()
            .and_then(|n| n.strip_prefix(SEMAPHORE_PREFIX))
        else {
            continue;
        };
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                trace!(path = %path.display(), "skipping semaphore: {e}");
                continue;
            }
        };
        semaphores.push(NamedSemaphore {
            name: name.to_string(),
            inode: meta.ino(),
            permissions: permission_bits(meta.mode()),
            size: meta.size(),
            path,
        });
    }
    semaphores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(semaphores)
}
