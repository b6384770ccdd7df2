//! Dispatcher configuration

use tunnelgate_proto::IdentifierTable;

/// Static configuration applied to every tunnel the dispatcher creates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Monitor server-to-client data for clipboard updates
    pub clipboard_integration: bool,
    /// Prefix table used to parse target identifiers
    pub identifiers: IdentifierTable,
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clipboard_integration(mut self, enabled: bool) -> Self {
        self.clipboard_integration = enabled;
        self
    }

    pub fn with_identifiers(mut self, identifiers: IdentifierTable) -> Self {
        self.identifiers = identifiers;
        self
    }
}
