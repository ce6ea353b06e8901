mod common;

use common::FakeProc;
use procsight::system::sockets::{Protocol, SocketState, build_socket_table};

const LISTEN_ROW: &str = "   0: 0100007F:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31337 1 0000000000000000 100 0 0 10 0";

#[test]
fn single_ipv4_listener_is_indexed_by_inode() {
    let proc = FakeProc::new();
    proc.net_table("tcp", &[LISTEN_ROW]);

    let table = build_socket_table(&proc.procfs());

    assert_eq!(table.len(), 1);
    let endpoint = table.get(31337).expect("inode 31337 indexed");
    assert_eq!(endpoint.protocol, Protocol::Tcp);
    assert_eq!(endpoint.local_address, "127.0.0.1:80");
    assert_eq!(endpoint.state, "LISTEN");
}

#[test]
fn all_four_tables_are_merged() {
    let proc = FakeProc::new();
    proc.net_table("tcp", &[LISTEN_ROW])
        .net_table(
            "udp",
            &["  12: 00000000:0044 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 4001 2 0000000000000000 0"],
        )
        .net_table(
            "tcp6",
            &["   0: 00000000000000000000000000000001:1F90 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4002 1 0000000000000000 100 0 0 10 0"],
        )
        .net_table(
            "udp6",
            &["  30: 00000000000000000000000000000000:14E9 00000000000000000000000000000000:0000 07 00000000:00000000 00:00000000 00000000   105        0 4003 2 0000000000000000 0"],
        );

    let table = build_socket_table(&proc.procfs());

    assert_eq!(table.len(), 4);
    assert_eq!(table.get(4001).unwrap().protocol, Protocol::Udp);
    assert_eq!(table.get(4001).unwrap().local_address, "0.0.0.0:68");
    assert_eq!(table.get(4001).unwrap().state, SocketState::Close);
    assert_eq!(table.get(4002).unwrap().local_address, "::1:8080");
    assert_eq!(table.get(4003).unwrap().protocol, Protocol::Udp6);
    assert_eq!(table.get(4003).unwrap().local_address, ":::5353");
}

#[test]
fn missing_tables_are_skipped() {
    let proc = FakeProc::new();
    proc.net_table("udp6", &[
        "   0: 00000000000000000000000000000000:0035 00000000000000000000000000000000:0000 07 0:0 00:0 0 0 0 99",
    ]);

    let table = build_socket_table(&proc.procfs());

    assert_eq!(table.len(), 1);
    assert!(table.get(99).is_some());
}

#[test]
fn empty_proc_root_gives_empty_table() {
    let proc = FakeProc::new();
    assert!(build_socket_table(&proc.procfs()).is_empty());
}

#[test]
fn malformed_rows_do_not_spoil_the_table() {
    let proc = FakeProc::new();
    proc.net_table("tcp", &[
        "   0: garbage",
        LISTEN_ROW,
        "   2: 0100007F:XYZW 00000000:0000 0A 0:0 00:0 0 0 0 77",
        "   3: 0100007F:0016 00000000:0000 63 0:0 00:0 0 0 0 78",
    ]);

    let table = build_socket_table(&proc.procfs());

    assert_eq!(table.len(), 2);
    assert!(table.get(77).is_none());
    assert_eq!(table.get(78).unwrap().state, SocketState::Unknown(99));
    assert_eq!(table.get(78).unwrap().state.to_string(), "UNKNOWN(99)");
}

#[test]
fn rebuilding_unchanged_tables_is_idempotent() {
    let proc = FakeProc::new();
    proc.net_table("tcp", &[
        LISTEN_ROW,
        "   1: 0100007F:0016 0100007F:C350 01 0:0 00:0 0 0 0 500",
    ]);

    let first = build_socket_table(&proc.procfs());
    let second = build_socket_table(&proc.procfs());

    assert_eq!(first, second);
    assert_eq!(second.get(500).unwrap().remote_address, "127.0.0.1:50000");
    assert_eq!(second.get(500).unwrap().state, SocketState::Established);
}
