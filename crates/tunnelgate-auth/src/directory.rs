//! In-memory directories and user context
//!
//! Default implementations for deployments without a database-backed
//! permission model: each user is given exactly the targets placed in their
//! directories.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tunnelgate_transport::{Connectable, DirectoryError, TargetDirectory};

use crate::user::UserContext;

/// Directory holding a fixed set of targets
#[derive(Clone, Default)]
pub struct StaticDirectory {
    targets: Arc<RwLock<HashMap<String, Arc<dyn Connectable>>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(self, target: Arc<dyn Connectable>) -> Self {
        self.insert(target);
        self
    }

    /// Add or replace a target, keyed by its identifier
    pub fn insert(&self, target: Arc<dyn Connectable>) -> Option<Arc<dyn Connectable>> {
        let mut targets = self
            .targets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        targets.insert(target.identifier().to_string(), target)
    }

    pub fn remove(&self, identifier: &str) -> Option<Arc<dyn Connectable>> {
        let mut targets = self
            .targets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        targets.remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.targets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TargetDirectory for StaticDirectory {
    async fn get(&self, identifier: &str) -> Result<Option<Arc<dyn Connectable>>, DirectoryError> {
        let targets = self
            .targets
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(targets.get(identifier).cloned())
    }

    async fn identifiers(&self) -> Result<Vec<String>, DirectoryError> {
        let targets = self
            .targets
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        let mut identifiers: Vec<String> = targets.keys().cloned().collect();
        identifiers.sort();
        Ok(identifiers)
    }
}

/// User context backed by two [`StaticDirectory`] instances
#[derive(Clone)]
pub struct StaticUserContext {
    username: String,
    connections: StaticDirectory,
    groups: StaticDirectory,
}

impl StaticUserContext {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            connections: StaticDirectory::new(),
            groups: StaticDirectory::new(),
        }
    }

    pub fn with_connection(self, connection: Arc<dyn Connectable>) -> Self {
        self.connections.insert(connection);
        self
    }

    pub fn with_group(self, group: Arc<dyn Connectable>) -> Self {
        self.groups.insert(group);
        self
    }

    pub fn connections(&self) -> &StaticDirectory {
        &self.connections
    }

    pub fn groups(&self) -> &StaticDirectory {
        &self.groups
    }
}

#[async_trait]
impl UserContext for StaticUserContext {
    fn username(&self) -> &str {
        &self.username
    }

    async fn connection_directory(&self) -> Result<Arc<dyn TargetDirectory>, DirectoryError> {
        Ok(Arc::new(self.connections.clone()))
    }

    async fn connection_group_directory(
        &self,
    ) -> Result<Arc<dyn TargetDirectory>, DirectoryError> {
        Ok(Arc::new(self.groups.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnelgate_proto::{ClientDisplayInfo, TargetKind};
    use tunnelgate_transport::{MemoryTunnel, Tunnel, TunnelResult};

    struct TestTarget {
        id: String,
    }

    #[async_trait]
    impl Connectable for TestTarget {
        fn identifier(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Test target"
        }

        async fn connect(&self, _info: &ClientDisplayInfo) -> TunnelResult<Arc<dyn Tunnel>> {
            let (tunnel, _endpoint) = MemoryTunnel::pair(4);
            Ok(Arc::new(tunnel))
        }
    }

    fn target(id: &str) -> Arc<dyn Connectable> {
        Arc::new(TestTarget { id: id.to_string() })
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = StaticDirectory::new()
            .with_target(target("room42"))
            .with_target(target("lab"));

        assert!(directory.get("room42").await.unwrap().is_some());
        assert!(directory.get("missing").await.unwrap().is_none());
        assert_eq!(
            directory.identifiers().await.unwrap(),
            vec!["lab".to_string(), "room42".to_string()]
        );

        directory.remove("lab");
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_user_context_directories() {
        let user = StaticUserContext::new("alice")
            .with_connection(target("room42"))
            .with_group(target("pool"));

        let connections = user.directory(TargetKind::Connection).await.unwrap();
        assert!(connections.get("room42").await.unwrap().is_some());
        assert!(connections.get("pool").await.unwrap().is_none());

        let groups = user.directory(TargetKind::ConnectionGroup).await.unwrap();
        assert!(groups.get("pool").await.unwrap().is_some());
        assert_eq!(user.username(), "alice");
    }
}
