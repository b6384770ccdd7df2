//! Tunnelgate: request-to-tunnel dispatch for remote-session gateways
//!
//! This crate ties the workspace together and re-exports the pieces an
//! embedding request layer needs:
//!
//! - [`proto`]: target identifiers, request parameters, client display info
//! - [`transport`]: the `Tunnel` and target traits plus in-memory tunnels
//! - [`auth`]: sessions, session stores, listeners and clipboard state
//! - [`control`]: the dispatcher and the monitored tunnel decorator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tunnelgate_lib::auth::{InMemorySessionStore, Session, StaticUserContext};
//! use tunnelgate_lib::control::{DispatcherConfig, TunnelDispatcher};
//! use tunnelgate_lib::loopback::LoopbackTarget;
//! use tunnelgate_lib::proto::TunnelRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let user = StaticUserContext::new("alice")
//!     .with_connection(Arc::new(LoopbackTarget::new("room42", "Room 42")));
//!
//! let store = Arc::new(InMemorySessionStore::new());
//! let (token, _session) = store.create_session(Session::new(Arc::new(user)));
//!
//! let dispatcher = TunnelDispatcher::new(store, DispatcherConfig::default());
//! let request = TunnelRequest::new()
//!     .with_parameter("authToken", token)
//!     .with_parameter("id", "c/room42");
//!
//! if let Some(tunnel) = dispatcher.create_tunnel(&request).await? {
//!     println!("Connected: {}", tunnel.uuid());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod loopback;

pub use config::{ConfigError, GatewayConfig};

pub use tunnelgate_auth as auth;
pub use tunnelgate_control as control;
pub use tunnelgate_proto as proto;
pub use tunnelgate_transport as transport;
