//! Per-user session state

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tunnelgate_proto::TargetReference;
use tunnelgate_transport::Tunnel;
use uuid::Uuid;

use crate::clipboard::ClipboardState;
use crate::listener::Listeners;
use crate::user::UserContext;

/// Record of a tunnel currently open within a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    pub tunnel_uuid: Uuid,
    /// Target the tunnel was requested for
    pub target: TargetReference,
    /// Display name of the target at connect time
    pub target_name: String,
    pub username: String,
    pub started_at: DateTime<Utc>,
}

struct TunnelEntry {
    tunnel: Arc<dyn Tunnel>,
    connection: ActiveConnection,
}

/// Server-side state of one authenticated user
///
/// The tunnel map is shared by every request worker of the session and keyed
/// by tunnel UUID in string form. Listeners are fixed at construction.
pub struct Session {
    user: Arc<dyn UserContext>,
    listeners: Listeners,
    tunnels: DashMap<String, TunnelEntry>,
    clipboard: Option<Arc<ClipboardState>>,
    created_at: DateTime<Utc>,
    /// Milliseconds since the epoch
    last_accessed: AtomicI64,
}

impl Session {
    pub fn new(user: Arc<dyn UserContext>) -> Self {
        let now = Utc::now();
        Self {
            user,
            listeners: Listeners::default(),
            tunnels: DashMap::new(),
            clipboard: None,
            created_at: now,
            last_accessed: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    /// Enable the clipboard buffer for this session
    pub fn with_clipboard(mut self, clipboard: ClipboardState) -> Self {
        self.clipboard = Some(Arc::new(clipboard));
        self
    }

    pub fn user_context(&self) -> &Arc<dyn UserContext> {
        &self.user
    }

    pub fn username(&self) -> &str {
        self.user.username()
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Clipboard buffer, present only when the integration is enabled
    pub fn clipboard(&self) -> Option<&Arc<ClipboardState>> {
        self.clipboard.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Mark the session as used now
    pub fn touch(&self) {
        self.last_accessed
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// How long the session has gone unused as of `now`
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_accessed()
    }

    /// Register a tunnel under its UUID
    pub fn add_tunnel(&self, tunnel: Arc<dyn Tunnel>, connection: ActiveConnection) {
        let tunnel_id = tunnel.uuid().to_string();
        let replaced = self
            .tunnels
            .insert(tunnel_id.clone(), TunnelEntry { tunnel, connection });

        if replaced.is_some() {
            warn!(tunnel_id = %tunnel_id, user = %self.username(), "Replaced tunnel with duplicate UUID");
        } else {
            debug!(tunnel_id = %tunnel_id, user = %self.username(), "Tunnel registered");
        }
    }

    /// Deregister a tunnel, returning it if it was registered
    pub fn remove_tunnel(&self, tunnel_id: &str) -> Option<Arc<dyn Tunnel>> {
        let removed = self.tunnels.remove(tunnel_id).map(|(_, entry)| entry.tunnel);
        if removed.is_some() {
            debug!(tunnel_id = %tunnel_id, user = %self.username(), "Tunnel deregistered");
        }
        removed
    }

    pub fn tunnel(&self, tunnel_id: &str) -> Option<Arc<dyn Tunnel>> {
        self.tunnels
            .get(tunnel_id)
            .map(|entry| entry.value().tunnel.clone())
    }

    pub fn has_tunnel(&self, tunnel_id: &str) -> bool {
        self.tunnels.contains_key(tunnel_id)
    }

    pub fn tunnel_count(&self) -> usize {
        self.tunnels.len()
    }

    pub fn tunnel_ids(&self) -> Vec<String> {
        self.tunnels.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Records for the given tunnel UUIDs which are still active
    ///
    /// Unknown UUIDs are skipped.
    pub fn active_connections(&self, tunnel_ids: &[String]) -> Vec<ActiveConnection> {
        tunnel_ids
            .iter()
            .filter_map(|id| {
                self.tunnels
                    .get(id)
                    .map(|entry| entry.value().connection.clone())
            })
            .collect()
    }

    /// Records for every active tunnel of the session
    pub fn all_active_connections(&self) -> Vec<ActiveConnection> {
        self.tunnels
            .iter()
            .map(|entry| entry.value().connection.clone())
            .collect()
    }

    /// Close and deregister every tunnel of this session
    ///
    /// A tunnel is deregistered only once its close succeeds. Tunnels which
    /// fail or refuse to close stay open and registered; the failure is
    /// logged and the remaining tunnels are still closed.
    pub async fn invalidate(&self) {
        let tunnel_ids = self.tunnel_ids();
        info!(
            user = %self.username(),
            tunnels = tunnel_ids.len(),
            "Invalidating session"
        );

        for tunnel_id in tunnel_ids {
            let Some(tunnel) = self.tunnel(&tunnel_id) else {
                continue;
            };

            match tunnel.close().await {
                // A monitored tunnel may already have deregistered itself
                Ok(()) => {
                    self.remove_tunnel(&tunnel_id);
                }
                Err(e) => {
                    warn!(tunnel_id = %tunnel_id, "Failed to close tunnel during session invalidation: {}", e);
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.username())
            .field("listeners", &self.listeners)
            .field("tunnels", &self.tunnel_count())
            .field("clipboard", &self.clipboard.is_some())
            .field("created_at", &self.created_at)
            .finish()
    }
}
