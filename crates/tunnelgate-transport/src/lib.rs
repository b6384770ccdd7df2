//! Tunnel and target abstractions
//!
//! The gateway never speaks the remote protocol itself. Transport
//! implementations provide [`Tunnel`]s, and whatever owns the connection
//! catalogue provides [`TargetDirectory`] and [`Connectable`] targets. This
//! crate holds those seams plus a channel-backed [`MemoryTunnel`] for
//! embedding and testing.

pub mod memory;
pub mod target;
pub mod tunnel;

pub use memory::{MemoryEndpoint, MemoryTunnel};
pub use target::{Connectable, DirectoryError, TargetDirectory};
pub use tunnel::{InstructionReader, InstructionWriter, Tunnel, TunnelError, TunnelResult};

// Re-export for implementors
pub use async_trait::async_trait;
