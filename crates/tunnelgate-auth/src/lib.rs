//! Sessions, listeners and authorization context for the tunnel gateway
//!
//! A [`Session`] is the server-side state of one authenticated user: the
//! [`UserContext`] scoping what they may connect to, the listeners observing
//! their tunnels, the tunnels they currently have open, and the shared
//! clipboard buffer. Sessions are looked up by auth token through a
//! [`SessionStore`].

pub mod clipboard;
pub mod directory;
pub mod listener;
pub mod session;
pub mod store;
pub mod user;

pub use clipboard::{ClipboardContents, ClipboardState};
pub use directory::{StaticDirectory, StaticUserContext};
pub use listener::{
    ListenerError, ListenerRegistration, Listeners, TunnelCloseListener, TunnelConnectListener,
    TunnelEvent, TunnelEventKind, Verdict,
};
pub use session::{ActiveConnection, Session};
pub use store::{InMemorySessionStore, SessionError, SessionStore};
pub use user::UserContext;

// Re-export for implementors
pub use async_trait::async_trait;
