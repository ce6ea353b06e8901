//! Inode-keyed index of the kernel's connection tables (`net/tcp`, `net/udp`,
//! `net/tcp6`, `net/udp6`).
//!
//! Row layout after the header line:
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue:rx_queue tr:tm->when retrnsmt   uid  timeout inode
//!    0: 0100007F:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31337 ...
//! ```
//!
//! The table is rebuilt from scratch for every classification pass.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use super::procfs::ProcFs;

const MIN_FIELDS: usize = 10;
const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Tcp6,
    Udp6,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Tcp, Protocol::Udp, Protocol::Tcp6, Protocol::Udp6];

    pub fn table_name(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Tcp6 => "tcp6",
            Protocol::Udp6 => "udp6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
    Unknown(u32),
}

impl SocketState {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => SocketState::Established,
            2 => SocketState::SynSent,
            3 => SocketState::SynRecv,
            4 => SocketState::FinWait1,
            5 => SocketState::FinWait2,
            6 => SocketState::TimeWait,
            7 => SocketState::Close,
            8 => SocketState::CloseWait,
            9 => SocketState::LastAck,
            10 => SocketState::Listen,
            11 => SocketState::Closing,
            12 => SocketState::NewSynRecv,
            other => SocketState::Unknown(other),
        }
    }

    fn name(self) -> &'static str {
        match self {
            SocketState::Established => "ESTABLISHED",
            SocketState::SynSent => "SYN_SENT",
            SocketState::SynRecv => "SYN_RECV",
            SocketState::FinWait1 => "FIN_WAIT1",
            SocketState::FinWait2 => "FIN_WAIT2",
            SocketState::TimeWait => "TIME_WAIT",
            SocketState::Close => "CLOSE",
            SocketState::CloseWait => "CLOSE_WAIT",
            SocketState::LastAck => "LAST_ACK",
            SocketState::Listen => "LISTEN",
            SocketState::Closing => "CLOSING",
            SocketState::NewSynRecv => "NEW_SYN_RECV",
            SocketState::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketState::Unknown(code) => write!(f, "UNKNOWN({code})"),
            known => f.write_str(known.name()),
        }
    }
}

impl PartialEq<&str> for SocketState {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

impl Serialize for SocketState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketEndpoint {
    pub protocol: Protocol,
    pub local_address: String,
    pub remote_address: String,
    pub state: SocketState,
    pub inode: u64,
}

/// inode -> endpoint, one classification cycle's worth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SocketTable {
    entries: HashMap<u64, SocketEndpoint>,
}

impl SocketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, inode: u64) -> Option<&SocketEndpoint> {
        self.entries.get(&inode)
    }

    pub fn insert(&mut self, endpoint: SocketEndpoint) {
        self.entries.insert(endpoint.inode, endpoint);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketEndpoint> {
        self.entries.values()
    }

    /// Parse one table's text and add its rows. Returns the number of rows
    /// discarded as malformed.
    pub fn ingest(&mut self, protocol: Protocol, content: &str) -> usize {
        let mut discarded = 0;
        // Header line.
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(protocol, line) {
                Some(endpoint) => self.insert(endpoint),
                None => {
                    trace!(protocol = protocol.table_name(), line, "discarding malformed row");
                    discarded += 1;
                }
            }
        }
        discarded
    }
}

/// Read all four tables under `procfs`. A table that is absent or unreadable
/// is skipped; the build itself never fails.
pub fn build_socket_table(procfs: &ProcFs) -> SocketTable {
    let _span = tracing::debug_span!("sockets.build").entered();
    let mut table = SocketTable::new();
    for protocol in Protocol::ALL {
        let path = procfs.net_table_path(protocol.table_name());
        match fs::read_to_string(&path) {
            Ok(content) => {
                let discarded = table.ingest(protocol, &content);
                if discarded > 0 {
                    debug!(table = %path.display(), discarded, "discarded malformed rows");
                }
            }
            Err(e) => debug!(table = %path.display(), "skipping connection table: {e}"),
        }
    }
    table
}

fn parse_row(protocol: Protocol, line: &str) -> Option<SocketEndpoint> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    let local_address = parse_endpoint(fields[1])?;
    let remote_address = parse_endpoint(fields[2])?;
    let state = SocketState::from_code(u32::from_str_radix(fields[3], 16).ok()?);
    let inode = fields[9].parse::<u64>().ok()?;
    Some(SocketEndpoint {
        protocol,
        local_address,
        remote_address,
        state,
        inode,
    })
}

/// `ADDR:PORT` with both halves in hex.
fn parse_endpoint(raw: &str) -> Option<String> {
    let (addr, port) = raw.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    Some(format!("{}:{port}", decode_address(addr)))
}

/// 8 hex chars: IPv4 stored as a little-endian u32. 32 hex chars: IPv6 taken
/// byte by byte in the order written. Anything else is reported as `N/A`.
pub fn decode_address(hex: &str) -> String {
    match hex.len() {
        8 => match u32::from_str_radix(hex, 16) {
            Ok(raw) => Ipv4Addr::from(raw.to_le_bytes()).to_string(),
            Err(_) => UNAVAILABLE.to_string(),
        },
        32 => match hex_bytes::<16>(hex) {
            Some(bytes) => Ipv6Addr::from(bytes).to_string(),
            None => UNAVAILABLE.to_string(),
        },
        _ => UNAVAILABLE.to_string(),
    }
}

fn hex_bytes<const N: usize>(hex: &str) -> Option<[u8; N]> {
    if hex.len() != N * 2 || !hex.is_ascii() {
        return None;
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
