//! Monitored tunnel decorator
//!
//! [`MonitoredTunnel`] is what clients actually receive. It behaves exactly
//! like the tunnel it wraps, except that readers pass through the configured
//! filters and closing first consults the session's close listeners and
//! deregisters the tunnel from the session.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use tunnelgate_auth::{SessionStore, Verdict};
use tunnelgate_transport::{InstructionReader, InstructionWriter, Tunnel, TunnelError, TunnelResult};
use uuid::Uuid;

use crate::filter::ReaderFilter;
use crate::notifier::ListenerNotifier;

/// Decorator tracking the lifecycle of a dispatched tunnel
pub struct MonitoredTunnel {
    inner: Arc<dyn Tunnel>,
    sessions: Arc<dyn SessionStore>,
    auth_token: String,
    filters: Vec<Arc<dyn ReaderFilter>>,
}

impl MonitoredTunnel {
    /// Wrap `inner`, re-resolving its session through `auth_token` on close
    pub fn new(
        inner: Arc<dyn Tunnel>,
        sessions: Arc<dyn SessionStore>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            sessions,
            auth_token: auth_token.into(),
            filters: Vec::new(),
        }
    }

    /// Append a reader filter; filters wrap in the order they are added
    pub fn with_filter(mut self, filter: Arc<dyn ReaderFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// The undecorated tunnel
    pub fn inner(&self) -> &Arc<dyn Tunnel> {
        &self.inner
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }
}

#[async_trait]
impl Tunnel for MonitoredTunnel {
    fn uuid(&self) -> Uuid {
        self.inner.uuid()
    }

    async fn acquire_reader(&self) -> TunnelResult<Box<dyn InstructionReader>> {
        let mut reader = self.inner.acquire_reader().await?;
        for filter in &self.filters {
            reader = filter.wrap(reader).await;
        }
        Ok(reader)
    }

    async fn acquire_writer(&self) -> TunnelResult<Box<dyn InstructionWriter>> {
        self.inner.acquire_writer().await
    }

    async fn close(&self) -> TunnelResult<()> {
        let tunnel_id = self.uuid().to_string();

        // A session that is already gone has nobody left to notify
        let session = match self.sessions.resolve(&self.auth_token).await {
            Ok(session) => session,
            Err(e) if e.is_unauthorized() => {
                debug!(tunnel_id = %tunnel_id, "Session destroyed prior to tunnel closure: {}", e);
                return self.inner.close().await;
            }
            Err(e) => return Err(TunnelError::Session(e.to_string())),
        };

        // Close listeners run at most once per tunnel
        if !session.has_tunnel(&tunnel_id) && !self.inner.is_open() {
            debug!(tunnel_id = %tunnel_id, "Tunnel already closed");
            return Ok(());
        }

        match ListenerNotifier::notify_close(&session, self).await {
            Ok(Verdict::Allow) => {}
            Ok(Verdict::Deny) => return Err(TunnelError::CloseCanceled),
            Err(e) => return Err(TunnelError::Listener(e.to_string())),
        }

        session.remove_tunnel(&tunnel_id);
        self.inner.close().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tunnelgate_auth::{
        ListenerError, ListenerRegistration, Listeners, Session, SessionError, StaticUserContext,
        TunnelCloseListener, TunnelEvent,
    };
    use tunnelgate_transport::MemoryTunnel;

    mock! {
        pub Sessions {}

        #[async_trait]
        impl SessionStore for Sessions {
            async fn resolve(&self, token: &str) -> Result<Arc<Session>, SessionError>;
        }
    }

    /// Tunnel counting how often it was closed
    struct CountingTunnel {
        inner: MemoryTunnel,
        closes: AtomicUsize,
    }

    impl CountingTunnel {
        fn new() -> Arc<Self> {
            let (inner, _endpoint) = MemoryTunnel::pair(4);
            Arc::new(Self {
                inner,
                closes: AtomicUsize::new(0),
            })
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tunnel for CountingTunnel {
        fn uuid(&self) -> Uuid {
            self.inner.uuid()
        }

        async fn acquire_reader(&self) -> TunnelResult<Box<dyn InstructionReader>> {
            self.inner.acquire_reader().await
        }

        async fn acquire_writer(&self) -> TunnelResult<Box<dyn InstructionWriter>> {
            self.inner.acquire_writer().await
        }

        async fn close(&self) -> TunnelResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    struct FixedCloseListener(Result<Verdict, ListenerError>);

    #[async_trait]
    impl TunnelCloseListener for FixedCloseListener {
        async fn tunnel_closed(&self, _event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError> {
            self.0.clone()
        }
    }

    fn session_with_close_listener(result: Result<Verdict, ListenerError>) -> Arc<Session> {
        let listeners = Listeners::new(vec![ListenerRegistration::new("close")
            .on_close(Arc::new(FixedCloseListener(result)))]);
        Arc::new(
            Session::new(Arc::new(StaticUserContext::new("alice"))).with_listeners(listeners),
        )
    }

    fn store_returning(result: Result<Arc<Session>, SessionError>) -> Arc<MockSessions> {
        let mut sessions = MockSessions::new();
        sessions
            .expect_resolve()
            .returning(move |_| result.clone());
        Arc::new(sessions)
    }

    fn register(session: &Session, monitored: &Arc<MonitoredTunnel>) {
        let connection = tunnelgate_auth::ActiveConnection {
            tunnel_uuid: monitored.uuid(),
            target: tunnelgate_proto::TargetReference::new(
                tunnelgate_proto::TargetKind::Connection,
                "room42",
            ),
            target_name: "Room 42".to_string(),
            username: "alice".to_string(),
            started_at: chrono::Utc::now(),
        };
        session.add_tunnel(monitored.clone(), connection);
    }

    #[tokio::test]
    async fn test_close_allowed_deregisters_and_closes() {
        let session = session_with_close_listener(Ok(Verdict::Allow));
        let inner = CountingTunnel::new();
        let monitored = Arc::new(MonitoredTunnel::new(
            inner.clone(),
            store_returning(Ok(session.clone())),
            "tok1",
        ));
        register(&session, &monitored);

        monitored.close().await.unwrap();

        assert_eq!(session.tunnel_count(), 0);
        assert_eq!(inner.closes(), 1);
        assert!(!monitored.is_open());
    }

    #[tokio::test]
    async fn test_close_denied_keeps_tunnel() {
        let session = session_with_close_listener(Ok(Verdict::Deny));
        let inner = CountingTunnel::new();
        let monitored = Arc::new(MonitoredTunnel::new(
            inner.clone(),
            store_returning(Ok(session.clone())),
            "tok1",
        ));
        register(&session, &monitored);

        let err = monitored.close().await.unwrap_err();

        assert!(matches!(err, TunnelError::CloseCanceled));
        assert!(session.has_tunnel(&monitored.uuid().to_string()));
        assert_eq!(inner.closes(), 0);
        assert!(monitored.is_open());
    }

    #[tokio::test]
    async fn test_close_listener_error_keeps_tunnel() {
        let session = session_with_close_listener(Err(ListenerError::new("audit log down")));
        let inner = CountingTunnel::new();
        let monitored = Arc::new(MonitoredTunnel::new(
            inner.clone(),
            store_returning(Ok(session.clone())),
            "tok1",
        ));
        register(&session, &monitored);

        let err = monitored.close().await.unwrap_err();

        assert!(matches!(err, TunnelError::Listener(ref message) if message == "audit log down"));
        assert_eq!(session.tunnel_count(), 1);
        assert_eq!(inner.closes(), 0);
    }

    #[tokio::test]
    async fn test_close_with_stale_session_closes_directly() {
        let inner = CountingTunnel::new();
        let monitored = MonitoredTunnel::new(
            inner.clone(),
            store_returning(Err(SessionError::InvalidToken)),
            "tok1",
        );

        monitored.close().await.unwrap();

        assert_eq!(inner.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_with_unavailable_store_fails() {
        let inner = CountingTunnel::new();
        let monitored = MonitoredTunnel::new(
            inner.clone(),
            store_returning(Err(SessionError::Unavailable("timeout".to_string()))),
            "tok1",
        );

        let err = monitored.close().await.unwrap_err();

        assert!(matches!(err, TunnelError::Session(_)));
        assert_eq!(inner.closes(), 0);
    }

    #[derive(Default)]
    struct CountingCloseListener {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TunnelCloseListener for CountingCloseListener {
        async fn tunnel_closed(&self, _event: &TunnelEvent<'_>) -> Result<Verdict, ListenerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Allow)
        }
    }

    #[tokio::test]
    async fn test_second_close_skips_listeners() {
        let listener = Arc::new(CountingCloseListener::default());
        let listeners =
            Listeners::new(vec![ListenerRegistration::new("count").on_close(listener.clone())]);
        let session = Arc::new(
            Session::new(Arc::new(StaticUserContext::new("alice"))).with_listeners(listeners),
        );
        let inner = CountingTunnel::new();
        let monitored = Arc::new(MonitoredTunnel::new(
            inner.clone(),
            store_returning(Ok(session.clone())),
            "tok1",
        ));
        register(&session, &monitored);

        monitored.close().await.unwrap();
        monitored.close().await.unwrap();

        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(inner.closes(), 1);
        assert_eq!(session.tunnel_count(), 0);
    }

    #[tokio::test]
    async fn test_delegates_uuid_and_reader() {
        let (inner, endpoint) = MemoryTunnel::pair(4);
        let inner: Arc<dyn Tunnel> = Arc::new(inner);
        let monitored = MonitoredTunnel::new(
            inner.clone(),
            Arc::new(MockSessions::new()),
            "tok1",
        );

        assert_eq!(monitored.uuid(), inner.uuid());
        assert!(monitored.filter_names().is_empty());

        endpoint
            .send(tunnelgate_proto::Instruction::new("sync", ["1"]))
            .await
            .unwrap();
        let mut reader = monitored.acquire_reader().await.unwrap();
        let instruction = reader.read_instruction().await.unwrap().unwrap();
        assert_eq!(instruction.opcode, "sync");
    }
}
