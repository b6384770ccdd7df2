//! Reader filters applied to monitored tunnels
//!
//! Which filters a tunnel gets is decided once, when the dispatcher creates
//! it. Each filter wraps the reader handed out by the tunnel below it; a
//! filter that cannot initialize returns the reader unchanged.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use tunnelgate_auth::SessionStore;
use tunnelgate_transport::InstructionReader;

use crate::clipboard::MonitoringReader;

/// A stage in the server-to-client reader pipeline
#[async_trait]
pub trait ReaderFilter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Wrap a reader, or return it untouched if the filter does not apply
    async fn wrap(&self, reader: Box<dyn InstructionReader>) -> Box<dyn InstructionReader>;
}

/// Feeds clipboard streams into the owning session's clipboard state
pub struct ClipboardFilter {
    sessions: Arc<dyn SessionStore>,
    auth_token: String,
}

impl ClipboardFilter {
    pub fn new(sessions: Arc<dyn SessionStore>, auth_token: impl Into<String>) -> Self {
        Self {
            sessions,
            auth_token: auth_token.into(),
        }
    }
}

#[async_trait]
impl ReaderFilter for ClipboardFilter {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    async fn wrap(&self, reader: Box<dyn InstructionReader>) -> Box<dyn InstructionReader> {
        let session = match self.sessions.resolve(&self.auth_token).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Clipboard integration failed to initialize: {}", e);
                debug!(error = ?e, "Error setting up clipboard integration");
                return reader;
            }
        };

        match session.clipboard() {
            Some(clipboard) => Box::new(MonitoringReader::new(clipboard.clone(), reader)),
            None => {
                warn!(
                    user = %session.username(),
                    "Clipboard integration failed to initialize: session has no clipboard"
                );
                reader
            }
        }
    }
}
