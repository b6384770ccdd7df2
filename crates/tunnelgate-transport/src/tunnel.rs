//! Tunnel trait for remote-session connections

use async_trait::async_trait;
use thiserror::Error;
use tunnelgate_proto::Instruction;
use uuid::Uuid;

/// Tunnel errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Tunnel closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Tunnel close canceled by listener")]
    CloseCanceled,

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Session error: {0}")]
    Session(String),
}

pub type TunnelResult<T> = Result<T, TunnelError>;

/// Reads decoded instructions travelling from the remote target to the client
#[async_trait]
pub trait InstructionReader: Send {
    /// Read the next instruction, or `None` once the stream has ended
    async fn read_instruction(&mut self) -> TunnelResult<Option<Instruction>>;
}

/// Writes instructions travelling from the client to the remote target
#[async_trait]
pub trait InstructionWriter: Send {
    async fn write_instruction(&mut self, instruction: &Instruction) -> TunnelResult<()>;
}

/// A live bidirectional channel to a remote target
///
/// Each tunnel has a UUID assigned at creation which never changes and is
/// used as its key wherever tunnels are tracked.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Unique identifier of this tunnel
    fn uuid(&self) -> Uuid;

    /// Acquire the reader for data sent by the remote target
    ///
    /// Implementations may hand out one reader at a time; acquiring again
    /// waits for the previous reader to be dropped.
    async fn acquire_reader(&self) -> TunnelResult<Box<dyn InstructionReader>>;

    /// Acquire a writer for data sent to the remote target
    async fn acquire_writer(&self) -> TunnelResult<Box<dyn InstructionWriter>>;

    /// Close the tunnel and release the underlying connection
    async fn close(&self) -> TunnelResult<()>;

    /// Check if the tunnel is still open
    fn is_open(&self) -> bool;
}

impl std::fmt::Debug for dyn Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel").field("uuid", &self.uuid()).finish()
    }
}
