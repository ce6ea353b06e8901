pub mod collector;
pub mod cpu;
pub mod platform;
pub mod process;
pub mod procfs;
pub mod resources;
pub mod sampler;
pub mod semaphores;
pub mod snapshot;
pub mod sockets;
pub mod sweep;
