#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use procsight::system::procfs::ProcFs;
use tempfile::TempDir;

pub const TCP_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

/// A throwaway proc tree laid out like the real one.
pub struct FakeProc {
    dir: TempDir,
}

impl FakeProc {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp proc root");
        fs::create_dir_all(dir.path().join("net")).expect("create net dir");
        FakeProc { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn procfs(&self) -> ProcFs {
        ProcFs::new(self.root())
    }

    /// Scratch space outside the pid directories.
    pub fn scratch(&self, name: &str) -> PathBuf {
        let path = self.root().join("scratch");
        fs::create_dir_all(&path).expect("create scratch dir");
        path.join(name)
    }

    pub fn system_ticks(&self, total: u64) -> &Self {
        // Spread the total over the usual columns.
        let user = total / 2;
        let idle = total - user;
        self.write("stat", &format!("cpu  {user} 0 0 {idle} 0 0 0 0 0 0\ncpu0 {user} 0 0 {idle} 0 0 0 0 0 0\n"));
        self
    }

    pub fn process(&self, pid: u32, name: &str, user: u64, kernel: u64) -> &Self {
        self.process_started_at(pid, name, user, kernel, 1000)
    }

    pub fn process_started_at(&self, pid: u32, name: &str, user: u64, kernel: u64, start: u64) -> &Self {
        self.write(
            &format!("{pid}/stat"),
            &format!("{pid} ({name}) S 1 {pid} {pid} 0 -1 4194560 100 0 0 0 {user} {kernel} 0 0 20 0 1 0 {start} 1000000 200\n"),
        );
        self.write(
            &format!("{pid}/status"),
            &format!("Name:\t{name}\nState:\tS (sleeping)\nUid:\t0\t0\t0\t0\nVmSize:\t   10240 kB\nVmRSS:\t    2048 kB\nVmData:\t     512 kB\nVmStk:\t     132 kB\nVmExe:\t      64 kB\nThreads:\t2\n"),
        );
        self.write(&format!("{pid}/statm"), "2560 512 256 16 0 128 0\n");
        fs::create_dir_all(self.root().join(format!("{pid}/fd"))).expect("create fd dir");
        self
    }

    pub fn remove_process(&self, pid: u32) {
        fs::remove_dir_all(self.root().join(pid.to_string())).expect("remove pid dir");
    }

    pub fn fd(&self, pid: u32, fd: u32, target: impl AsRef<Path>) -> &Self {
        let dir = self.root().join(format!("{pid}/fd"));
        fs::create_dir_all(&dir).expect("create fd dir");
        symlink(target, dir.join(fd.to_string())).expect("create fd link");
        self
    }

    pub fn net_table(&self, name: &str, rows: &[&str]) -> &Self {
        let mut content = String::from(TCP_HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        self.write(&format!("net/{name}"), &content);
        self
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write fake proc file");
    }
}
