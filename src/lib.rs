//! Point-in-time and delta-based introspection of Linux processes.
//!
//! - [`system::procfs`] reads raw counters and attributes.
//! - [`system::sampler`] and [`system::cpu`] turn two readings into CPU usage.
//! - [`system::sockets`] indexes the connection tables by inode.
//! - [`system::resources`] classifies a process's open descriptors.
//! - [`system::collector`] drives full-system sweeps over all of the above.

#[cfg(not(unix))]
compile_error!("procsight reads Unix file metadata and builds on Unix targets only");

pub mod config;
pub mod error;
pub mod format;
pub mod system;

pub use error::{FailureKind, ProbeError, Result};
