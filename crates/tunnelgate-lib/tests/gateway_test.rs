//! End-to-end tests through the public facade
//!
//! Configuration drives the dispatcher, loopback targets stand in for remote
//! machines, and sessions are created and torn down through the store.

use std::sync::Arc;
use std::time::Duration;
use tunnelgate_lib::auth::{InMemorySessionStore, Session, SessionStore, StaticUserContext};
use tunnelgate_lib::control::{ErrorCategory, TunnelDispatcher};
use tunnelgate_lib::loopback::LoopbackTarget;
use tunnelgate_lib::proto::{Instruction, TunnelRequest};
use tunnelgate_lib::GatewayConfig;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tunnelgate=debug")
        .try_init();
}

fn request(token: &str, id: &str) -> TunnelRequest {
    TunnelRequest::new()
        .with_parameter("authToken", token)
        .with_parameter("id", id)
}

#[tokio::test]
async fn test_custom_prefixes_route_to_groups() {
    init_tracing();

    let config = GatewayConfig::parse(
        r#"
identifier_prefixes:
  - prefix: "conn:"
    kind: connection
  - prefix: "pool:"
    kind: connection_group
"#,
    )
    .unwrap();

    let pool = Arc::new(LoopbackTarget::new("desktops", "Desktop pool"));
    let user = StaticUserContext::new("alice").with_group(pool.clone());
    let store = Arc::new(config.build_session_store());
    let (token, session) = store.create_session(Session::new(Arc::new(user)));
    let dispatcher = TunnelDispatcher::new(store.clone(), config.build_dispatcher_config().unwrap());

    let tunnel = dispatcher
        .create_tunnel(&request(&token, "pool:desktops"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pool.connection_count(), 1);
    assert!(session.has_tunnel(&tunnel.uuid().to_string()));

    // The default prefixes mean nothing under this configuration
    let err = dispatcher
        .create_tunnel(&request(&token, "g/desktops"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ClientInput);

    // A group id looked up as a connection is simply not authorized
    let err = dispatcher
        .create_tunnel(&request(&token, "conn:desktops"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);
}

#[tokio::test]
async fn test_invalidating_session_closes_all_tunnels() {
    init_tracing();

    let config = GatewayConfig::default();
    let room = Arc::new(LoopbackTarget::new("room42", "Room 42"));
    let user = StaticUserContext::new("alice").with_connection(room.clone());
    let store = Arc::new(config.build_session_store());
    let (token, session) = store.create_session(Session::new(Arc::new(user)));
    let dispatcher = TunnelDispatcher::new(store.clone(), config.build_dispatcher_config().unwrap());

    let mut tunnels = Vec::new();
    for _ in 0..3 {
        tunnels.push(
            dispatcher
                .create_tunnel(&request(&token, "c/room42"))
                .await
                .unwrap()
                .unwrap(),
        );
    }
    assert_eq!(session.tunnel_count(), 3);

    let mut endpoint = room.take_endpoint().unwrap();
    assert!(store.invalidate(&token).await);

    assert_eq!(session.tunnel_count(), 0);
    assert!(tunnels.iter().all(|tunnel| !tunnel.is_open()));
    tokio::time::timeout(Duration::from_secs(1), endpoint.closed())
        .await
        .expect("remote end should observe the close");

    let err = store.resolve(&token).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn test_expired_sessions_are_swept() {
    init_tracing();

    let room = Arc::new(LoopbackTarget::new("room42", "Room 42"));
    let user = StaticUserContext::new("alice").with_connection(room.clone());
    let store = Arc::new(InMemorySessionStore::new().with_timeout(Some(Duration::from_millis(20))));
    let (token, session) = store.create_session(Session::new(Arc::new(user)));
    let dispatcher = TunnelDispatcher::new(
        store.clone(),
        GatewayConfig::default().build_dispatcher_config().unwrap(),
    );

    let tunnel = dispatcher
        .create_tunnel(&request(&token, "c/room42"))
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(store.sweep_expired().await, 1);
    assert!(!tunnel.is_open());
    assert_eq!(session.tunnel_count(), 0);

    let err = dispatcher
        .create_tunnel(&request(&token, "c/room42"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn test_writer_reaches_remote_end() {
    init_tracing();

    let config = GatewayConfig::parse("clipboard_integration: true").unwrap();
    let room = Arc::new(LoopbackTarget::new("room42", "Room 42"));
    let user = StaticUserContext::new("alice").with_connection(room.clone());
    let store = Arc::new(config.build_session_store());
    let (token, _session) = store.create_session(
        Session::new(Arc::new(user)).with_clipboard(Default::default()),
    );
    let dispatcher = TunnelDispatcher::new(store.clone(), config.build_dispatcher_config().unwrap());

    let tunnel = dispatcher
        .create_tunnel(
            &request(&token, "c/room42")
                .with_parameter("audio", "audio/L16")
                .with_parameter("video", "video/webm"),
        )
        .await
        .unwrap()
        .unwrap();
    let mut endpoint = room.take_endpoint().unwrap();

    let mut writer = tunnel.acquire_writer().await.unwrap();
    writer
        .write_instruction(&Instruction::new("key", ["65", "1"]))
        .await
        .unwrap();

    let received = endpoint.recv().await.unwrap();
    assert_eq!(received, Instruction::new("key", ["65", "1"]));

    tunnel.close().await.unwrap();
    assert!(endpoint.is_closed());
}
