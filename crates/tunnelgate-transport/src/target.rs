//! Connectable targets and the directories that expose them

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tunnelgate_proto::ClientDisplayInfo;

use crate::tunnel::{Tunnel, TunnelResult};

/// Directory errors
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// A connection or connection group that can be connected to
#[async_trait]
pub trait Connectable: Send + Sync {
    /// Identifier the target is stored under in its directory
    fn identifier(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Establish a new tunnel to this target
    async fn connect(&self, info: &ClientDisplayInfo) -> TunnelResult<Arc<dyn Tunnel>>;
}

/// Lookup of connectable targets, scoped to whoever obtained the directory
///
/// Directories handed out by a user context only ever return targets that
/// user is allowed to use. A target that exists but is not permitted is
/// reported the same way as one that does not exist.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Look up a target by identifier
    async fn get(&self, identifier: &str) -> Result<Option<Arc<dyn Connectable>>, DirectoryError>;

    /// Identifiers of every target visible through this directory
    async fn identifiers(&self) -> Result<Vec<String>, DirectoryError>;
}
