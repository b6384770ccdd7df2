//! Tunnel creation for authenticated requests

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tunnelgate_auth::{ActiveConnection, Session, SessionError, SessionStore, Verdict};
use tunnelgate_proto::{
    ClientDisplayInfo, TargetReference, TunnelRequest, AUTH_TOKEN_PARAM, ID_PARAM,
};
use tunnelgate_transport::{Connectable, DirectoryError, Tunnel};

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::filter::ClipboardFilter;
use crate::monitor::MonitoredTunnel;
use crate::notifier::ListenerNotifier;

/// Entry point turning tunnel requests into registered, monitored tunnels
pub struct TunnelDispatcher {
    sessions: Arc<dyn SessionStore>,
    config: DispatcherConfig,
}

impl TunnelDispatcher {
    pub fn new(sessions: Arc<dyn SessionStore>, config: DispatcherConfig) -> Self {
        Self { sessions, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Create a tunnel for the request
    ///
    /// Returns `Ok(None)` when a connect listener denies the tunnel. The
    /// tunnel is closed in that case and never registered with the session.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`] for the failure classes. Missing and forbidden
    /// targets both fail with [`DispatchError::NotAuthorized`].
    pub async fn create_tunnel(
        &self,
        request: &TunnelRequest,
    ) -> Result<Option<Arc<dyn Tunnel>>, DispatchError> {
        let auth_token = request.parameter(AUTH_TOKEN_PARAM).unwrap_or_default();
        let session = self.sessions.resolve(auth_token).await?;

        let raw_id = request.required_parameter(ID_PARAM)?;
        let target = self.config.identifiers.parse(raw_id)?;
        let info = ClientDisplayInfo::from_request(request)?;

        let connectable = self.lookup(&session, &target).await?;

        let tunnel = match connectable.connect(&info).await {
            Ok(tunnel) => tunnel,
            Err(e) => {
                error!(
                    reference = %target,
                    user = %session.username(),
                    "Failed to connect: {}",
                    e
                );
                return Err(DispatchError::Connection { target, source: e });
            }
        };

        info!(
            user = %session.username(),
            reference = %target,
            tunnel_id = %tunnel.uuid(),
            width = info.optimal_width,
            height = info.optimal_height,
            "User \"{}\" successfully connected to \"{}\".",
            session.username(),
            target.id
        );

        let monitored: Arc<dyn Tunnel> = Arc::new(self.monitor(tunnel.clone(), auth_token));

        match ListenerNotifier::notify_connect(&session, monitored.as_ref()).await {
            Ok(Verdict::Allow) => {}
            Ok(Verdict::Deny) => {
                info!(tunnel_id = %tunnel.uuid(), "Successful connection canceled by hook.");
                Self::discard(tunnel.as_ref()).await;
                return Ok(None);
            }
            Err(e) => {
                Self::discard(tunnel.as_ref()).await;
                return Err(e.into());
            }
        }

        let connection = ActiveConnection {
            tunnel_uuid: monitored.uuid(),
            target,
            target_name: connectable.name().to_string(),
            username: session.username().to_string(),
            started_at: Utc::now(),
        };
        session.add_tunnel(monitored.clone(), connection);

        Ok(Some(monitored))
    }

    /// Close one of the session's registered tunnels
    ///
    /// Returns `Ok(false)` if no tunnel with that id is registered.
    pub async fn close_tunnel(&self, auth_token: &str, tunnel_id: &str) -> Result<bool, DispatchError> {
        let session = self.sessions.resolve(auth_token).await?;
        let Some(tunnel) = session.tunnel(tunnel_id) else {
            debug!(tunnel_id = %tunnel_id, "No such tunnel to close");
            return Ok(false);
        };

        tunnel.close().await.map_err(|e| {
            warn!(tunnel_id = %tunnel_id, "Tunnel close failed: {}", e);
            DispatchError::Close(e)
        })?;
        Ok(true)
    }

    /// Active connection records of the session for the given tunnel ids
    pub async fn active_connections(
        &self,
        auth_token: &str,
        tunnel_ids: &[String],
    ) -> Result<Vec<ActiveConnection>, SessionError> {
        let session = self.sessions.resolve(auth_token).await?;
        Ok(session.active_connections(tunnel_ids))
    }

    async fn lookup(
        &self,
        session: &Session,
        target: &TargetReference,
    ) -> Result<Arc<dyn Connectable>, DispatchError> {
        let not_authorized = || {
            info!(
                "{} \"{}\" does not exist for user \"{}\".",
                capitalize(target.kind.as_str()),
                target.id,
                session.username()
            );
            DispatchError::NotAuthorized(target.kind)
        };

        let directory = match session.user_context().directory(target.kind).await {
            Ok(directory) => directory,
            Err(DirectoryError::PermissionDenied(_)) => return Err(not_authorized()),
            Err(e) => return Err(DispatchError::Directory(e)),
        };

        match directory.get(&target.id).await {
            Ok(Some(connectable)) => Ok(connectable),
            Ok(None) | Err(DirectoryError::PermissionDenied(_)) => Err(not_authorized()),
            Err(e) => Err(DispatchError::Directory(e)),
        }
    }

    fn monitor(&self, tunnel: Arc<dyn Tunnel>, auth_token: &str) -> MonitoredTunnel {
        let mut monitored = MonitoredTunnel::new(tunnel, self.sessions.clone(), auth_token);
        if self.config.clipboard_integration {
            monitored = monitored.with_filter(Arc::new(ClipboardFilter::new(
                self.sessions.clone(),
                auth_token,
            )));
        }
        monitored
    }

    /// Release a tunnel that will never be registered
    async fn discard(tunnel: &dyn Tunnel) {
        if let Err(e) = tunnel.close().await {
            warn!(tunnel_id = %tunnel.uuid(), "Failed to close rejected tunnel: {}", e);
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
