//! Session lookup by auth token

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::Session;

/// Default idle time after which a session expires
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Session lookup errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing auth token")]
    MissingToken,

    #[error("Invalid or unknown auth token")]
    InvalidToken,

    #[error("Session expired")]
    Expired,

    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

impl SessionError {
    /// The token does not (or no longer) name a session
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SessionError::MissingToken | SessionError::InvalidToken | SessionError::Expired
        )
    }
}

/// Maps auth tokens to live sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a token to its session
    ///
    /// # Errors
    ///
    /// Unknown, missing or expired tokens fail with an error for which
    /// [`SessionError::is_unauthorized`] holds.
    async fn resolve(&self, token: &str) -> Result<Arc<Session>, SessionError>;
}

/// In-memory session store with idle expiry
///
/// All sessions are lost when the process restarts.
pub struct InMemorySessionStore {
    sessions: DashMap<String, Arc<Session>>,
    timeout: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            timeout: Some(DEFAULT_SESSION_TIMEOUT),
        }
    }

    /// Set the idle timeout (`None` disables expiry)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Store a session under a freshly generated token
    pub fn create_session(&self, session: Session) -> (String, Arc<Session>) {
        let token = Uuid::new_v4().simple().to_string();
        let session = self.insert_session(token.clone(), session);
        (token, session)
    }

    /// Store a session under the given token, replacing any previous one
    pub fn insert_session(&self, token: impl Into<String>, session: Session) -> Arc<Session> {
        let token = token.into();
        let session = Arc::new(session);
        info!(user = %session.username(), "Session created");
        self.sessions.insert(token, session.clone());
        session
    }

    /// Remove a session and close all of its tunnels
    ///
    /// Returns `false` if the token was unknown.
    pub async fn invalidate(&self, token: &str) -> bool {
        // Remove before closing so tunnels see the session as gone
        let Some((_, session)) = self.sessions.remove(token) else {
            return false;
        };

        info!(user = %session.username(), "Session invalidated");
        session.invalidate().await;
        true
    }

    /// Invalidate every session idle for longer than the timeout
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| self.is_expired(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for token in expired {
            if self.invalidate(&token).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Swept {} expired session(s)", removed);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn is_expired(&self, session: &Session) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };

        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => session.idle_for(Utc::now()) > timeout,
            Err(_) => false,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn resolve(&self, token: &str) -> Result<Arc<Session>, SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let session = self
            .sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::InvalidToken)?;

        if self.is_expired(&session) {
            info!(user = %session.username(), "Session expired");
            self.invalidate(token).await;
            return Err(SessionError::Expired);
        }

        session.touch();
        Ok(session)
    }
}
