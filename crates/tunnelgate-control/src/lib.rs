//! Request-to-tunnel dispatch
//!
//! [`TunnelDispatcher`] turns an authenticated tunnel request into a live,
//! monitored tunnel: it resolves the session and target, connects, wraps the
//! result in a [`MonitoredTunnel`], lets the session's listeners veto the
//! connection via [`ListenerNotifier`], and registers the tunnel with the
//! session. Closing a monitored tunnel runs the same listeners again before
//! the underlying connection is released.
pub mod clipboard;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod monitor;
pub mod notifier;

pub use clipboard::MonitoringReader;
pub use config::DispatcherConfig;
pub use dispatcher::TunnelDispatcher;
pub use error::{DispatchError, ErrorCategory};
pub use filter::{ClipboardFilter, ReaderFilter};
pub use monitor::MonitoredTunnel;
pub use notifier::ListenerNotifier;
