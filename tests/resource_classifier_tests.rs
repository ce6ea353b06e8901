mod common;

use std::fs;

use common::FakeProc;
use insta::assert_snapshot;
use procsight::ProbeError;
use procsight::system::resources::{
    ClassifierRules, ResourceKind, ResourceReport, list_open_resources,
};
use procsight::system::sockets::build_socket_table;

fn rules_for(proc: &FakeProc) -> ClassifierRules {
    ClassifierRules {
        named_semaphore_prefix: format!("{}/sem.", proc.scratch("shm").display()),
        anonymous_semaphore_marker: "anon_inode:[eventfd]".to_string(),
    }
}

fn summary(report: &ResourceReport) -> String {
    let mut rows: Vec<(u32, String)> = report
        .iter()
        .map(|r| (r.fd, format!("{} {:?}", r.fd, r.kind)))
        .collect();
    rows.sort();
    rows.into_iter().map(|(_, line)| line).collect::<Vec<_>>().join("\n")
}

fn populated() -> FakeProc {
    let proc = FakeProc::new();
    proc.process(100, "server", 10, 5);

    let log = proc.scratch("server.log");
    fs::write(&log, "hello").unwrap();
    let shm = proc.scratch("shm");
    fs::create_dir_all(&shm).unwrap();
    let sem = shm.join("sem.jobs");
    fs::write(&sem, [0u8; 32]).unwrap();

    proc.net_table("tcp", &[
        "   0: 0100007F:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31337 1 0000000000000000 100 0 0 10 0",
    ]);

    proc.fd(100, 0, "/dev/null")
        .fd(100, 3, &log)
        .fd(100, 4, "socket:[31337]")
        .fd(100, 5, "socket:[424242]")
        .fd(100, 6, "pipe:[8080]")
        .fd(100, 7, &sem)
        .fd(100, 8, "anon_inode:[eventfd]")
        .fd(100, 9, proc.scratch("deleted.tmp"))
        .fd(100, 10, proc.root().join("scratch"));
    proc
}

#[test]
fn every_descriptor_is_classified() {
    let proc = populated();
    let table = build_socket_table(&proc.procfs());

    let report = list_open_resources(&proc.procfs(), 100, &table, &rules_for(&proc)).unwrap();

    assert_eq!(report.pid, 100);
    assert_snapshot!(summary(&report), @r"
    0 CharDevice
    3 RegularFile
    4 NetworkSocket
    5 UnixOrOtherSocket
    6 Pipe
    7 PosixSemaphoreNamed
    8 PosixSemaphoreAnonymous
    9 BrokenOrInaccessible
    10 Directory
    ");
}

#[test]
fn entries_are_bucketed_and_carry_metadata() {
    let proc = populated();
    let table = build_socket_table(&proc.procfs());

    let report = list_open_resources(&proc.procfs(), 100, &table, &rules_for(&proc)).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.devices.len(), 1);
    assert_eq!(report.sockets.len(), 2);
    assert_eq!(report.pipes.len(), 1);
    assert_eq!(report.named_semaphores.len(), 1);
    assert_eq!(report.anonymous_semaphores.len(), 1);
    assert_eq!(report.broken.len(), 1);
    assert_eq!(report.len(), 9);

    let log = report.files.iter().find(|r| r.fd == 3).unwrap();
    assert_eq!(log.size, Some(5));
    assert!(log.mode.as_deref().is_some_and(|m| m.starts_with("100")));
    assert!(log.inode.is_some());

    let network = report.sockets.iter().find(|r| r.fd == 4).unwrap();
    assert_eq!(network.inode, Some(31337));
    let endpoint = network.endpoint.as_ref().unwrap();
    assert_eq!(endpoint.local_address, "127.0.0.1:80");
    assert_eq!(endpoint.state, "LISTEN");

    assert_eq!(report.pipes[0].inode, Some(8080));
    assert_eq!(report.named_semaphores[0].size, Some(32));
}

#[test]
fn semaphore_prefix_wins_over_regular_file() {
    let proc = populated();
    let report = list_open_resources(
        &proc.procfs(),
        100,
        &build_socket_table(&proc.procfs()),
        &rules_for(&proc),
    )
    .unwrap();

    let sem = report.named_semaphores.first().unwrap();
    assert_eq!(sem.fd, 7);
    assert_eq!(sem.kind, ResourceKind::PosixSemaphoreNamed);
    // The backing file stats as a regular file, but that rule comes later.
    assert!(sem.mode.as_deref().is_some_and(|m| m.starts_with("100")));
}

#[test]
fn vanished_target_is_broken_and_others_survive() {
    let proc = populated();
    let victim = proc.scratch("victim.dat");
    fs::write(&victim, "x").unwrap();
    proc.fd(100, 11, &victim);
    fs::remove_file(&victim).unwrap();

    let report = list_open_resources(
        &proc.procfs(),
        100,
        &build_socket_table(&proc.procfs()),
        &rules_for(&proc),
    )
    .unwrap();

    let broken: Vec<u32> = report.broken.iter().map(|r| r.fd).collect();
    assert_eq!(broken, vec![9, 11]);
    assert_eq!(report.len(), 10);
    assert!(report.broken.iter().all(|r| r.target.ends_with(".tmp") || r.target.ends_with(".dat")));
}

#[test]
fn non_numeric_entries_are_ignored() {
    let proc = populated();
    fs::write(proc.root().join("100/fd/README"), "not a descriptor").unwrap();

    let report = list_open_resources(
        &proc.procfs(),
        100,
        &build_socket_table(&proc.procfs()),
        &rules_for(&proc),
    )
    .unwrap();

    assert_eq!(report.len(), 9);
}

#[test]
fn missing_descriptor_directory_is_not_found() {
    let proc = FakeProc::new();
    let err = list_open_resources(
        &proc.procfs(),
        4242,
        &build_socket_table(&proc.procfs()),
        &ClassifierRules::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ProbeError::NotFound { .. }));
}

#[test]
fn descriptor_naming_a_symlink_is_a_symlink_target() {
    let proc = populated();
    let real = proc.scratch("config.toml");
    fs::write(&real, "x = 1").unwrap();
    let alias = proc.scratch("current.toml");
    std::os::unix::fs::symlink(&real, &alias).unwrap();
    proc.fd(100, 12, &alias);

    let report = list_open_resources(
        &proc.procfs(),
        100,
        &build_socket_table(&proc.procfs()),
        &rules_for(&proc),
    )
    .unwrap();

    let entry = report.files.iter().find(|r| r.fd == 12).unwrap();
    assert_eq!(entry.kind, ResourceKind::SymlinkTarget);
    assert!(entry.mode.as_deref().is_some_and(|m| m.starts_with("120")));
}
