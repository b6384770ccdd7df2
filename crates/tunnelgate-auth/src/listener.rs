//! Tunnel lifecycle listeners
//!
//! Listeners observe tunnels being connected and closed, and may veto
//! either. Rather than inspecting a listener's type at notification time,
//! each listener is registered with the capabilities it provides: a
//! [`ListenerRegistration`] carries an optional connect observer and an
//! optional close observer. A session's [`Listeners`] are fixed when the
//! session is created and shared read-only afterwards.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tunnelgate_transport::Tunnel;

use crate::user::UserContext;

/// Outcome of a listener notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

/// Error raised by a listener while handling an event
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which lifecycle event is being signalled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelEventKind {
    Connect,
    Close,
}

impl fmt::Display for TunnelEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelEventKind::Connect => f.write_str("connect"),
            TunnelEventKind::Close => f.write_str("close"),
        }
    }
}

/// A tunnel lifecycle event
pub struct TunnelEvent<'a> {
    pub kind: TunnelEventKind,
    /// User owning the tunnel
    pub user: &'a dyn UserContext,
    /// The tunnel as handed to the client (decorated)
    pub tunnel: &'a dyn Tunnel,
}

impl<'a> TunnelEvent<'a> {
    pub fn connect(user: &'a dyn UserContext, tunnel: &'a dyn Tunnel) -> Self {
        Self {
            kind: TunnelEventKind::Connect,
            user,
            tunnel,
        }
    }

    pub fn close(user: &'a dyn UserContext, tunnel: &'a dyn Tunnel) -> Self {
        Self {
            kind: TunnelEventKind::Close,
            user,
            tunnel,
        }
    }
}

/// Observer of tunnels being connected
#[async_trait]
pub trait TunnelConnectListener: Send + Sync {
    /// Called before a new tunnel is handed to the client
    ///
    /// Returning [`Verdict::Deny`] cancels the connection.
    async fn tunnel_connected(&self, event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError>;
}

/// Observer of tunnels being closed
#[async_trait]
pub trait TunnelCloseListener: Send + Sync {
    /// Called before a tunnel is closed
    ///
    /// Returning [`Verdict::Deny`] cancels the close and leaves the tunnel open.
    async fn tunnel_closed(&self, event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError>;
}

/// A named listener and the capabilities it registered for
#[derive(Clone)]
pub struct ListenerRegistration {
    name: String,
    connect: Option<Arc<dyn TunnelConnectListener>>,
    close: Option<Arc<dyn TunnelCloseListener>>,
}

impl ListenerRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connect: None,
            close: None,
        }
    }

    /// Register for both connect and close events
    pub fn observing<L>(name: impl Into<String>, listener: Arc<L>) -> Self
    where
        L: TunnelConnectListener + TunnelCloseListener + 'static,
    {
        Self::new(name)
            .on_connect(listener.clone())
            .on_close(listener)
    }

    pub fn on_connect(mut self, listener: Arc<dyn TunnelConnectListener>) -> Self {
        self.connect = Some(listener);
        self
    }

    pub fn on_close(mut self, listener: Arc<dyn TunnelCloseListener>) -> Self {
        self.close = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connect_listener(&self) -> Option<&Arc<dyn TunnelConnectListener>> {
        self.connect.as_ref()
    }

    pub fn close_listener(&self) -> Option<&Arc<dyn TunnelCloseListener>> {
        self.close.as_ref()
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("name", &self.name)
            .field("connect", &self.connect.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

/// Ordered, immutable list of listener registrations
#[derive(Debug, Clone)]
pub struct Listeners {
    registrations: Arc<[ListenerRegistration]>,
}

impl Listeners {
    pub fn new(registrations: Vec<ListenerRegistration>) -> Self {
        Self {
            registrations: registrations.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListenerRegistration> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FromIterator<ListenerRegistration> for Listeners {
    fn from_iter<T: IntoIterator<Item = ListenerRegistration>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowAll;

    #[async_trait]
    impl TunnelConnectListener for AllowAll {
        async fn tunnel_connected(&self, _event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError> {
            Ok(Verdict::Allow)
        }
    }

    #[async_trait]
    impl TunnelCloseListener for AllowAll {
        async fn tunnel_closed(&self, _event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError> {
            Ok(Verdict::Allow)
        }
    }

    #[test]
    fn test_registration_capabilities() {
        let connect_only = ListenerRegistration::new("audit").on_connect(Arc::new(AllowAll));
        assert!(connect_only.connect_listener().is_some());
        assert!(connect_only.close_listener().is_none());

        let both = ListenerRegistration::observing("quota", Arc::new(AllowAll));
        assert!(both.connect_listener().is_some());
        assert!(both.close_listener().is_some());
        assert_eq!(both.name(), "quota");
    }

    #[test]
    fn test_listeners_keep_order() {
        let listeners: Listeners = ["first", "second", "third"]
            .into_iter()
            .map(ListenerRegistration::new)
            .collect();

        let names: Vec<&str> = listeners.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(listeners.len(), 3);
        assert!(Listeners::default().is_empty());
    }

    #[test]
    fn test_verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Allow);
        assert_eq!(Verdict::from(false), Verdict::Deny);
        assert!(!Verdict::Deny.is_allowed());
    }
}
