//! Target identifier parsing
//!
//! Clients name the resource they want to reach with a single string of the
//! form `<prefix><id>`. The prefix selects the kind of target (a single
//! connection or a connection group) and the remainder is passed verbatim to
//! the directory responsible for that kind.
//!
//! Prefixes are resolved against an ordered table and the first entry whose
//! prefix leads the raw identifier wins. Tables built through
//! [`IdentifierTable::new`] refuse overlapping prefixes so that the order of
//! entries never decides where a request is routed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of target an identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A single remote connection
    Connection,
    /// A group of connections (balancing or organizational)
    ConnectionGroup,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Connection => "connection",
            TargetKind::ConnectionGroup => "connection group",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Illegal identifier - unknown type: {0:?}")]
    UnknownIdentifierKind(String),

    #[error("Identifier prefix must not be empty")]
    EmptyPrefix,

    #[error("Identifier prefix {first:?} overlaps with {second:?}")]
    AmbiguousPrefix { first: String, second: String },
}

/// A parsed, typed reference to a connectable target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetReference {
    pub kind: TargetKind,
    pub id: String,
}

impl TargetReference {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Parse a raw identifier using the default prefix table
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        IdentifierTable::default().parse(raw)
    }
}

impl fmt::Display for TargetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Ordered table of identifier prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierTable {
    entries: Vec<(String, TargetKind)>,
}

impl IdentifierTable {
    /// Prefix used for single connections in the default table
    pub const CONNECTION_PREFIX: &'static str = "c/";

    /// Prefix used for connection groups in the default table
    pub const CONNECTION_GROUP_PREFIX: &'static str = "g/";

    /// Build a table from ordered `(prefix, kind)` entries
    ///
    /// # Errors
    ///
    /// Fails if any prefix is empty, or if one prefix is a leading substring
    /// of another (including duplicates).
    pub fn new<I, S>(entries: I) -> Result<Self, IdentifierError>
    where
        I: IntoIterator<Item = (S, TargetKind)>,
        S: Into<String>,
    {
        let entries: Vec<(String, TargetKind)> = entries
            .into_iter()
            .map(|(prefix, kind)| (prefix.into(), kind))
            .collect();

        for (i, (prefix, _)) in entries.iter().enumerate() {
            if prefix.is_empty() {
                return Err(IdentifierError::EmptyPrefix);
            }

            for (other, _) in entries.iter().skip(i + 1) {
                if prefix.starts_with(other.as_str()) || other.starts_with(prefix.as_str()) {
                    return Err(IdentifierError::AmbiguousPrefix {
                        first: prefix.clone(),
                        second: other.clone(),
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    /// Parse a raw identifier into a typed reference
    ///
    /// The remainder after the prefix is taken verbatim, including the empty
    /// string; whether it names anything is for the directory to decide.
    pub fn parse(&self, raw: &str) -> Result<TargetReference, IdentifierError> {
        self.entries
            .iter()
            .find_map(|(prefix, kind)| {
                raw.strip_prefix(prefix.as_str())
                    .map(|id| TargetReference::new(*kind, id))
            })
            .ok_or_else(|| IdentifierError::UnknownIdentifierKind(raw.to_string()))
    }

    /// Prefix registered for the given kind, if any
    pub fn prefix_for(&self, kind: TargetKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, k)| *k == kind)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Render a reference back into its raw form
    pub fn format(&self, reference: &TargetReference) -> Option<String> {
        self.prefix_for(reference.kind)
            .map(|prefix| format!("{}{}", prefix, reference.id))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, TargetKind)> {
        self.entries.iter().map(|(p, k)| (p.as_str(), *k))
    }
}

impl Default for IdentifierTable {
    fn default() -> Self {
        Self {
            entries: vec![
                (Self::CONNECTION_PREFIX.to_string(), TargetKind::Connection),
                (
                    Self::CONNECTION_GROUP_PREFIX.to_string(),
                    TargetKind::ConnectionGroup,
                ),
            ],
        }
    }
}
