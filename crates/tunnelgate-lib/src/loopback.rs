//! Loopback targets backed by in-memory tunnels
//!
//! Used by the `dispatch` command to exercise the full dispatch path without
//! a remote protocol implementation.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;
use tunnelgate_proto::ClientDisplayInfo;
use tunnelgate_transport::{Connectable, MemoryEndpoint, MemoryTunnel, Tunnel, TunnelResult};

/// Target whose tunnels end in a [`MemoryEndpoint`] held by the target
pub struct LoopbackTarget {
    identifier: String,
    name: String,
    capacity: usize,
    endpoints: Mutex<Vec<MemoryEndpoint>>,
}

impl LoopbackTarget {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            capacity: tunnelgate_transport::memory::DEFAULT_CAPACITY,
            endpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Take the remote end of the most recently connected tunnel
    pub fn take_endpoint(&self) -> Option<MemoryEndpoint> {
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
    }

    pub fn connection_count(&self) -> usize {
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl Connectable for LoopbackTarget {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, info: &ClientDisplayInfo) -> TunnelResult<Arc<dyn Tunnel>> {
        let (tunnel, endpoint) = MemoryTunnel::pair(self.capacity);
        debug!(
            target_id = %self.identifier,
            tunnel_id = %tunnel.uuid(),
            width = info.optimal_width,
            height = info.optimal_height,
            dpi = info.optimal_resolution,
            "Loopback tunnel connected"
        );

        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(endpoint);
        Ok(Arc::new(tunnel))
    }
}
