//! Listener notification passes
//!
//! Listeners run in registration order. The first denial stops the pass
//! and the first error stops it too, overriding any earlier approvals.
//! Listeners that did not register for the event's capability are skipped.

use tracing::{debug, trace, warn};
use tunnelgate_auth::{ListenerError, Listeners, Session, TunnelEvent, TunnelEventKind, Verdict};
use tunnelgate_transport::Tunnel;

/// Runs connect and close notification passes over a session's listeners
pub struct ListenerNotifier;

impl ListenerNotifier {
    /// Notify every listener registered for the event's kind
    ///
    /// Returns [`Verdict::Allow`] if nobody denied (including when there are
    /// no listeners at all).
    pub async fn notify(
        event: &TunnelEvent<'_>,
        listeners: &Listeners,
    ) -> Result<Verdict, ListenerError> {
        for registration in listeners.iter() {
            let result = match event.kind {
                TunnelEventKind::Connect => match registration.connect_listener() {
                    Some(listener) => listener.tunnel_connected(event).await,
                    None => continue,
                },
                TunnelEventKind::Close => match registration.close_listener() {
                    Some(listener) => listener.tunnel_closed(event).await,
                    None => continue,
                },
            };

            match result {
                Ok(Verdict::Allow) => {
                    trace!(
                        listener = %registration.name(),
                        event = %event.kind,
                        tunnel_id = %event.tunnel.uuid(),
                        "Listener allowed tunnel event"
                    );
                }
                Ok(Verdict::Deny) => {
                    debug!(
                        listener = %registration.name(),
                        event = %event.kind,
                        tunnel_id = %event.tunnel.uuid(),
                        user = %event.user.username(),
                        "Listener denied tunnel event"
                    );
                    return Ok(Verdict::Deny);
                }
                Err(e) => {
                    warn!(
                        listener = %registration.name(),
                        event = %event.kind,
                        tunnel_id = %event.tunnel.uuid(),
                        "Listener failed: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(Verdict::Allow)
    }

    /// Ask the session's listeners whether a new tunnel may connect
    pub async fn notify_connect(
        session: &Session,
        tunnel: &dyn Tunnel,
    ) -> Result<Verdict, ListenerError> {
        let event = TunnelEvent::connect(session.user_context().as_ref(), tunnel);
        Self::notify(&event, session.listeners()).await
    }

    /// Ask the session's listeners whether a tunnel may close
    pub async fn notify_close(
        session: &Session,
        tunnel: &dyn Tunnel,
    ) -> Result<Verdict, ListenerError> {
        let event = TunnelEvent::close(session.user_context().as_ref(), tunnel);
        Self::notify(&event, session.listeners()).await
    }
}
