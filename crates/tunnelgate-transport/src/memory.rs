//! In-memory tunnel backed by channels
//!
//! [`MemoryTunnel::pair`] returns the gateway-facing tunnel together with the
//! [`MemoryEndpoint`] standing in for the remote target. Instructions sent on
//! the endpoint come out of the tunnel's reader, and instructions written to
//! the tunnel arrive at the endpoint.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tracing::debug;
use tunnelgate_proto::Instruction;
use uuid::Uuid;

use crate::tunnel::{InstructionReader, InstructionWriter, Tunnel, TunnelError, TunnelResult};

/// Default channel capacity for [`MemoryTunnel::pair`]
pub const DEFAULT_CAPACITY: usize = 64;

/// Gateway side of an in-memory tunnel
pub struct MemoryTunnel {
    uuid: Uuid,
    from_remote: Arc<Mutex<mpsc::Receiver<Instruction>>>,
    to_remote: mpsc::Sender<Instruction>,
    closed_tx: watch::Sender<bool>,
}

/// Remote side of an in-memory tunnel
pub struct MemoryEndpoint {
    to_client: mpsc::Sender<Instruction>,
    from_client: mpsc::Receiver<Instruction>,
    closed_rx: watch::Receiver<bool>,
}

impl MemoryTunnel {
    /// Create a connected tunnel/endpoint pair
    pub fn pair(capacity: usize) -> (MemoryTunnel, MemoryEndpoint) {
        let (to_client, from_remote) = mpsc::channel(capacity);
        let (to_remote, from_client) = mpsc::channel(capacity);
        let (closed_tx, closed_rx) = watch::channel(false);

        let tunnel = MemoryTunnel {
            uuid: Uuid::new_v4(),
            from_remote: Arc::new(Mutex::new(from_remote)),
            to_remote,
            closed_tx,
        };

        let endpoint = MemoryEndpoint {
            to_client,
            from_client,
            closed_rx,
        };

        (tunnel, endpoint)
    }
}

#[async_trait]
impl Tunnel for MemoryTunnel {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn acquire_reader(&self) -> TunnelResult<Box<dyn InstructionReader>> {
        if !self.is_open() {
            return Err(TunnelError::Closed);
        }

        let rx = self.from_remote.clone().lock_owned().await;
        Ok(Box::new(MemoryReader {
            rx,
            closed: self.closed_tx.subscribe(),
        }))
    }

    async fn acquire_writer(&self) -> TunnelResult<Box<dyn InstructionWriter>> {
        if !self.is_open() {
            return Err(TunnelError::Closed);
        }

        Ok(Box::new(MemoryWriter {
            tx: self.to_remote.clone(),
            closed: self.closed_tx.subscribe(),
        }))
    }

    async fn close(&self) -> TunnelResult<()> {
        let was_closed = self.closed_tx.send_replace(true);
        if was_closed {
            debug!(tunnel_id = %self.uuid, "Memory tunnel already closed");
        } else {
            debug!(tunnel_id = %self.uuid, "Memory tunnel closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !*self.closed_tx.borrow()
    }
}

struct MemoryReader {
    rx: OwnedMutexGuard<mpsc::Receiver<Instruction>>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl InstructionReader for MemoryReader {
    async fn read_instruction(&mut self) -> TunnelResult<Option<Instruction>> {
        tokio::select! {
            biased;
            _ = wait_closed(&mut self.closed) => Ok(None),
            instruction = self.rx.recv() => Ok(instruction),
        }
    }
}

struct MemoryWriter {
    tx: mpsc::Sender<Instruction>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl InstructionWriter for MemoryWriter {
    async fn write_instruction(&mut self, instruction: &Instruction) -> TunnelResult<()> {
        if *self.closed.borrow() {
            return Err(TunnelError::Closed);
        }

        self.tx
            .send(instruction.clone())
            .await
            .map_err(|_| TunnelError::Closed)
    }
}

impl MemoryEndpoint {
    /// Send an instruction to the client side
    pub async fn send(&self, instruction: Instruction) -> TunnelResult<()> {
        if self.is_closed() {
            return Err(TunnelError::Closed);
        }

        self.to_client
            .send(instruction)
            .await
            .map_err(|_| TunnelError::Closed)
    }

    /// Receive the next instruction written by the client side
    pub async fn recv(&mut self) -> Option<Instruction> {
        self.from_client.recv().await
    }

    /// Whether the gateway side has closed the tunnel
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Wait until the gateway side closes the tunnel
    pub async fn closed(&mut self) {
        wait_closed(&mut self.closed_rx).await
    }
}

async fn wait_closed(signal: &mut watch::Receiver<bool>) {
    loop {
        let closed = *signal.borrow_and_update();
        if closed {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}
