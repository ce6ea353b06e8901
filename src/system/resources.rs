//! Per-process open resource classification.
//!
//! Each entry of `/proc/<pid>/fd` is a symbolic link. The link text and a
//! stat of the object it resolves to are the only evidence available, and
//! several kernel pseudo-paths satisfy more than one test, so the rules are
//! applied in a fixed order and the first match wins:
//!
//! 1. POSIX semaphore (anonymous marker, then named prefix)
//! 2. `socket:[inode]`, enriched from the [`SocketTable`]
//! 3. `pipe:[inode]`
//! 4. file-type bits of the resolved object, when it could be stat'ed
//! 5. otherwise broken or inaccessible

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde::Serialize;
use tracing::trace;

use super::procfs::{Pid, ProcFs};
use super::sockets::{SocketEndpoint, SocketTable};
use crate::error::{ProbeError, Result};
use crate::format::format_mode;

const SOCKET_PREFIX: &str = "socket:[";
const PIPE_PREFIX: &str = "pipe:[";

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFBLK: u32 = 0o060000;
const S_IFLNK: u32 = 0o120000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    RegularFile,
    Directory,
    CharDevice,
    BlockDevice,
    SymlinkTarget,
    Pipe,
    UnixOrOtherSocket,
    NetworkSocket,
    PosixSemaphoreNamed,
    PosixSemaphoreAnonymous,
    BrokenOrInaccessible,
    Other,
}

/// Path prefixes that identify POSIX semaphores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    /// Backing store of `sem_open` semaphores.
    pub named_semaphore_prefix: String,
    pub anonymous_semaphore_marker: String,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        ClassifierRules {
            named_semaphore_prefix: "/dev/shm/sem.".to_string(),
            anonymous_semaphore_marker: "anon_inode:[eventfd]".to_string(),
        }
    }
}

/// Stat of the object a descriptor resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetStat {
    pub mode: u32,
    pub inode: u64,
    pub size: u64,
}

impl TargetStat {
    pub fn from_metadata(meta: &Metadata) -> Self {
        TargetStat {
            mode: meta.mode(),
            inode: meta.ino(),
            size: meta.size(),
        }
    }

    pub fn file_kind(&self) -> ResourceKind {
        match self.mode & S_IFMT {
            S_IFREG => ResourceKind::RegularFile,
            S_IFDIR => ResourceKind::Directory,
            S_IFCHR => ResourceKind::CharDevice,
            S_IFBLK => ResourceKind::BlockDevice,
            S_IFLNK => ResourceKind::SymlinkTarget,
            _ => ResourceKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: ResourceKind,
    pub socket_inode: Option<u64>,
    pub endpoint: Option<SocketEndpoint>,
}

impl Classification {
    fn plain(kind: ResourceKind) -> Self {
        Classification {
            kind,
            socket_inode: None,
            endpoint: None,
        }
    }
}

pub fn classify(
    target: &str,
    stat: Option<&TargetStat>,
    table: &SocketTable,
    rules: &ClassifierRules,
) -> Classification {
    if !rules.anonymous_semaphore_marker.is_empty()
        && target.starts_with(&rules.anonymous_semaphore_marker)
    {
        return Classification::plain(ResourceKind::PosixSemaphoreAnonymous);
    }
    if !rules.named_semaphore_prefix.is_empty()
        && target.starts_with(&rules.named_semaphore_prefix)
    {
        return Classification::plain(ResourceKind::PosixSemaphoreNamed);
    }
    if let Some(inode) = pseudo_inode(target, SOCKET_PREFIX) {
        return match table.get(inode) {
            Some(endpoint) => Classification {
                kind: ResourceKind::NetworkSocket,
                socket_inode: Some(inode),
                endpoint: Some(endpoint.clone()),
            },
            None => Classification {
                kind: ResourceKind::UnixOrOtherSocket,
                socket_inode: Some(inode),
                endpoint: None,
            },
        };
    }
    if pseudo_inode(target, PIPE_PREFIX).is_some() {
        return Classification::plain(ResourceKind::Pipe);
    }
    match stat {
        Some(stat) => Classification::plain(stat.file_kind()),
        None => Classification::plain(ResourceKind::BrokenOrInaccessible),
    }
}

/// `prefix<digits>]` -> digits.
fn pseudo_inode(target: &str, prefix: &str) -> Option<u64> {
    target
        .strip_prefix(prefix)?
        .strip_suffix(']')?
        .parse::<u64>()
        .ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenResource {
    pub fd: u32,
    pub target: String,
    pub kind: ResourceKind,
    /// Octal `st_mode` of the resolved object.
    pub mode: Option<String>,
    pub inode: Option<u64>,
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<SocketEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpenResource {
    fn new(fd: u32, target: String, class: Classification, stat: Option<TargetStat>) -> Self {
        let inode = stat
            .map(|s| s.inode)
            .or(class.socket_inode)
            .or_else(|| pseudo_inode(&target, PIPE_PREFIX));
        OpenResource {
            fd,
            target,
            kind: class.kind,
            mode: stat.map(|s| format_mode(s.mode)),
            inode,
            size: stat.map(|s| s.size),
            endpoint: class.endpoint,
            error: None,
        }
    }

    fn broken(fd: u32, target: String, err: &io::Error) -> Self {
        OpenResource {
            fd,
            target,
            kind: ResourceKind::BrokenOrInaccessible,
            mode: None,
            inode: None,
            size: None,
            endpoint: None,
            error: Some(err.to_string()),
        }
    }
}

/// Open resources of one process, bucketed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceReport {
    pub pid: Pid,
    pub files: Vec<OpenResource>,
    pub sockets: Vec<OpenResource>,
    pub pipes: Vec<OpenResource>,
    pub devices: Vec<OpenResource>,
    pub named_semaphores: Vec<OpenResource>,
    pub anonymous_semaphores: Vec<OpenResource>,
    pub broken: Vec<OpenResource>,
    pub other: Vec<OpenResource>,
}

impl ResourceReport {
    pub fn new(pid: Pid) -> Self {
        ResourceReport {
            pid,
            ..Default::default()
        }
    }

    pub fn push(&mut self, resource: OpenResource) {
        let bucket = match resource.kind {
            ResourceKind::RegularFile | ResourceKind::Directory | ResourceKind::SymlinkTarget => {
                &mut self.files
            }
            ResourceKind::NetworkSocket | ResourceKind::UnixOrOtherSocket => &mut self.sockets,
            ResourceKind::Pipe => &mut self.pipes,
            ResourceKind::CharDevice | ResourceKind::BlockDevice => &mut self.devices,
            ResourceKind::PosixSemaphoreNamed => &mut self.named_semaphores,
            ResourceKind::PosixSemaphoreAnonymous => &mut self.anonymous_semaphores,
            ResourceKind::BrokenOrInaccessible => &mut self.broken,
            ResourceKind::Other => &mut self.other,
        };
        bucket.push(resource);
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenResource> {
        self.files
            .iter()
            .chain(&self.sockets)
            .chain(&self.pipes)
            .chain(&self.devices)
            .chain(&self.named_semaphores)
            .chain(&self.anonymous_semaphores)
            .chain(&self.broken)
            .chain(&self.other)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enumerate and classify every descriptor of `pid`.
///
/// Only an unreadable descriptor directory fails the call. Problems with a
/// single descriptor become a `BrokenOrInaccessible` entry; a descriptor
/// closed between listing and inspection is dropped.
pub fn list_open_resources(
    procfs: &ProcFs,
    pid: Pid,
    table: &SocketTable,
    rules: &ClassifierRules,
) -> Result<ResourceReport> {
    let _span = tracing::debug_span!("resources.list", pid).entered();
    let dir = procfs.fd_dir(pid);
    let entries = fs::read_dir(&dir).map_err(|e| ProbeError::from_io(&dir, e))?;

    let mut descriptors: Vec<(u32, std::path::PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let fd = entry.file_name().to_str()?.parse::<u32>().ok()?;
            Some((fd, entry.path()))
        })
        .collect();
    descriptors.sort_unstable_by_key(|(fd, _)| *fd);

    let mut report = ResourceReport::new(pid);
    for (fd, path) in descriptors {
        if let Some(resource) = inspect_descriptor(fd, &path, table, rules) {
            report.push(resource);
        }
    }
    Ok(report)
}

fn inspect_descriptor(
    fd: u32,
    link: &Path,
    table: &SocketTable,
    rules: &ClassifierRules,
) -> Option<OpenResource> {
    let target = match fs::read_link(link) {
        Ok(target) => target.to_string_lossy().into_owned(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            trace!(fd, "descriptor closed during listing");
            return None;
        }
        Err(e) => return Some(OpenResource::broken(fd, String::new(), &e)),
    };
    let stat = match fs::metadata(link) {
        Ok(meta) => Some(TargetStat::from_metadata(&meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Some(OpenResource::broken(fd, target, &e)),
    };
    // Descriptors opened with O_PATH | O_NOFOLLOW name the link itself.
    let stat = match target_link_stat(&target) {
        Some(link_stat) => Some(link_stat),
        None => stat,
    };
    let class = classify(&target, stat.as_ref(), table, rules);
    Some(OpenResource::new(fd, target, class, stat))
}

fn target_link_stat(target: &str) -> Option<TargetStat> {
    if !target.starts_with('/') {
        return None;
    }
    let meta = fs::symlink_metadata(target).ok()?;
    meta.file_type()
        .is_symlink()
        .then(|| TargetStat::from_metadata(&meta))
}
