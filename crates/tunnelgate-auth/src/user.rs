//! Per-user authorization context

use async_trait::async_trait;
use std::sync::Arc;
use tunnelgate_proto::TargetKind;
use tunnelgate_transport::{DirectoryError, TargetDirectory};

/// Authorization context of an authenticated user
///
/// Directories returned here are restricted to what the user may access.
#[async_trait]
pub trait UserContext: Send + Sync {
    /// Name of the user this context belongs to
    fn username(&self) -> &str;

    /// Connections visible to this user
    async fn connection_directory(&self) -> Result<Arc<dyn TargetDirectory>, DirectoryError>;

    /// Connection groups visible to this user
    async fn connection_group_directory(
        &self,
    ) -> Result<Arc<dyn TargetDirectory>, DirectoryError>;

    /// Directory responsible for the given kind of target
    async fn directory(&self, kind: TargetKind) -> Result<Arc<dyn TargetDirectory>, DirectoryError> {
        match kind {
            TargetKind::Connection => self.connection_directory().await,
            TargetKind::ConnectionGroup => self.connection_group_directory().await,
        }
    }
}
