//! Dispatch errors

use thiserror::Error;
use tunnelgate_auth::{ListenerError, SessionError};
use tunnelgate_proto::{IdentifierError, RequestError, TargetKind, TargetReference};
use tunnelgate_transport::{DirectoryError, TunnelError};

/// Broad classes of dispatch failure, as seen by the request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or missing request parameters
    ClientInput,
    /// Invalid session, or target missing or not permitted
    Authorization,
    /// The remote target could not be reached
    TargetConnection,
    /// A listener failed while being notified
    Listener,
    /// A collaborator backend failed
    Internal,
}

/// Errors returned by [`TunnelDispatcher::create_tunnel`](crate::TunnelDispatcher::create_tunnel)
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Deliberately the same whether the target is missing or forbidden
    #[error("Requested {0} is not authorized")]
    NotAuthorized(TargetKind),

    #[error("Directory lookup failed: {0}")]
    Directory(DirectoryError),

    #[error("Failed to connect to {target}: {source}")]
    Connection {
        target: TargetReference,
        #[source]
        source: TunnelError,
    },

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Failed to close tunnel: {0}")]
    Close(#[source] TunnelError),
}

impl DispatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DispatchError::Request(_) | DispatchError::Identifier(_) => ErrorCategory::ClientInput,
            DispatchError::Session(e) if e.is_unauthorized() => ErrorCategory::Authorization,
            DispatchError::Session(_) => ErrorCategory::Internal,
            DispatchError::NotAuthorized(_) => ErrorCategory::Authorization,
            DispatchError::Directory(_) => ErrorCategory::Internal,
            DispatchError::Connection { .. } => ErrorCategory::TargetConnection,
            DispatchError::Listener(_) => ErrorCategory::Listener,
            DispatchError::Close(TunnelError::CloseCanceled | TunnelError::Listener(_)) => {
                ErrorCategory::Listener
            }
            DispatchError::Close(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status a request layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            DispatchError::Request(_) | DispatchError::Identifier(_) => 400,
            DispatchError::Session(e) if e.is_unauthorized() => 401,
            DispatchError::Session(_) => 503,
            DispatchError::NotAuthorized(_) => 403,
            DispatchError::Directory(_) => 500,
            DispatchError::Connection { .. } => 502,
            DispatchError::Listener(_) => 500,
            DispatchError::Close(TunnelError::CloseCanceled) => 409,
            DispatchError::Close(_) => 500,
        }
    }

    /// Client errors are never worth retrying unchanged
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ClientInput | ErrorCategory::Authorization
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let input = DispatchError::from(IdentifierError::UnknownIdentifierKind("x".to_string()));
        assert_eq!(input.category(), ErrorCategory::ClientInput);
        assert_eq!(input.http_status(), 400);
        assert!(input.is_client_error());

        let session = DispatchError::from(SessionError::Expired);
        assert_eq!(session.category(), ErrorCategory::Authorization);
        assert_eq!(session.http_status(), 401);

        let backend = DispatchError::from(SessionError::Unavailable("down".to_string()));
        assert_eq!(backend.category(), ErrorCategory::Internal);
        assert!(!backend.is_client_error());

        let forbidden = DispatchError::NotAuthorized(TargetKind::ConnectionGroup);
        assert_eq!(forbidden.category(), ErrorCategory::Authorization);
        assert_eq!(forbidden.http_status(), 403);
        assert_eq!(
            forbidden.to_string(),
            "Requested connection group is not authorized"
        );

        let connection = DispatchError::Connection {
            target: TargetReference::new(TargetKind::Connection, "room42"),
            source: TunnelError::ConnectionFailed("refused".to_string()),
        };
        assert_eq!(connection.category(), ErrorCategory::TargetConnection);
        assert_eq!(connection.http_status(), 502);

        let listener = DispatchError::from(ListenerError::new("quota exceeded"));
        assert_eq!(listener.category(), ErrorCategory::Listener);

        let canceled = DispatchError::Close(TunnelError::CloseCanceled);
        assert_eq!(canceled.category(), ErrorCategory::Listener);
        assert_eq!(canceled.http_status(), 409);
        assert!(!canceled.is_client_error());
    }
}
