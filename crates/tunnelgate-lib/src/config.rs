//! Gateway configuration file support
//!
//! Configuration is a small YAML document:
//!
//! ```yaml
//! clipboard_integration: true
//! session_timeout_secs: 3600
//! identifier_prefixes:
//!   - prefix: "c/"
//!     kind: connection
//!   - prefix: "g/"
//!     kind: connection_group
//! ```
//!
//! Every field is optional. `TUNNELGATE_CLIPBOARD_INTEGRATION` overrides the
//! clipboard flag from the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tunnelgate_auth::InMemorySessionStore;
use tunnelgate_control::DispatcherConfig;
use tunnelgate_proto::{IdentifierError, IdentifierTable, TargetKind};

/// Environment variable overriding [`GatewayConfig::clipboard_integration`]
pub const CLIPBOARD_INTEGRATION_ENV: &str = "TUNNELGATE_CLIPBOARD_INTEGRATION";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid identifier prefixes: {0}")]
    Identifiers(#[from] IdentifierError),

    #[error("Invalid value {value:?} for {name}, expected true or false")]
    InvalidOverride { name: String, value: String },
}

/// One entry of the identifier prefix table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub prefix: String,
    pub kind: TargetKind,
}

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Track clipboard data sent by remote targets
    #[serde(default)]
    pub clipboard_integration: bool,

    /// Idle time after which sessions expire (0 disables expiry)
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Ordered prefix table; the built-in `c/` and `g/` table when absent
    #[serde(default)]
    pub identifier_prefixes: Option<Vec<PrefixEntry>>,
}

fn default_session_timeout() -> u64 {
    3600
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            clipboard_integration: false,
            session_timeout_secs: default_session_timeout(),
            identifier_prefixes: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_overrides(path, |name| std::env::var(name).ok())
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default_with_overrides(|name| std::env::var(name).ok())
    }

    /// Load configuration from a YAML file, then apply overrides from `lookup`
    pub fn load_with_overrides<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content)?;
        config.apply_overrides(lookup)?;
        debug!(path = ?path, "Loaded gateway config");
        Ok(config)
    }

    /// Default configuration, then overrides from `lookup`
    pub fn default_with_overrides<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Parse configuration from YAML content
    ///
    /// The prefix table is validated here so a bad file fails early.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_yaml::from_str(content)?;
        config.identifier_table()?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(CLIPBOARD_INTEGRATION_ENV) {
            self.clipboard_integration = parse_flag(CLIPBOARD_INTEGRATION_ENV, &value)?;
        }
        Ok(())
    }

    pub fn identifier_table(&self) -> Result<IdentifierTable, IdentifierError> {
        match &self.identifier_prefixes {
            Some(entries) => IdentifierTable::new(
                entries
                    .iter()
                    .map(|entry| (entry.prefix.clone(), entry.kind)),
            ),
            None => Ok(IdentifierTable::default()),
        }
    }

    /// Session idle timeout, `None` if expiry is disabled
    pub fn session_timeout(&self) -> Option<Duration> {
        match self.session_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn build_dispatcher_config(&self) -> Result<DispatcherConfig, ConfigError> {
        Ok(DispatcherConfig::new()
            .with_clipboard_integration(self.clipboard_integration)
            .with_identifiers(self.identifier_table()?))
    }

    /// Session store honouring the configured timeout
    pub fn build_session_store(&self) -> InMemorySessionStore {
        InMemorySessionStore::new().with_timeout(self.session_timeout())
    }

    /// Commented template for a new configuration file
    pub fn template() -> String {
        r#"# tunnelgate configuration

# Track clipboard data sent by remote targets
clipboard_integration: false

# Idle seconds before a session expires (0 disables expiry)
session_timeout_secs: 3600

# Identifier prefixes, matched in order
identifier_prefixes:
  - prefix: "c/"
    kind: connection
  - prefix: "g/"
    kind: connection_group
"#
        .to_string()
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
