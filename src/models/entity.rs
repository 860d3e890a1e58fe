//! Entity kinds, identifiers and records.

use super::composite::compose;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of remote objects that CSV rows refer to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Organizations (tenants).
    Organization,
    /// Puppet environments.
    Environment,
    /// Operating systems, named `BASE[ MAJOR[.MINOR]]`.
    #[serde(alias = "os", alias = "operatingsystem")]
    OperatingSystem,
    /// DNS domains.
    Domain,
    /// CPU architectures.
    Architecture,
    /// Partition tables.
    #[serde(alias = "ptable")]
    PartitionTable,
}

impl EntityKind {
    /// Returns all entity kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Organization,
            Self::Environment,
            Self::OperatingSystem,
            Self::Domain,
            Self::Architecture,
            Self::PartitionTable,
        ]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Environment => "environment",
            Self::OperatingSystem => "operating_system",
            Self::Domain => "domain",
            Self::Architecture => "architecture",
            Self::PartitionTable => "partition_table",
        }
    }

    /// Position of this kind in [`Self::all`].
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Organization => 0,
            Self::Environment => 1,
            Self::OperatingSystem => 2,
            Self::Domain => 3,
            Self::Architecture => 4,
            Self::PartitionTable => 5,
        }
    }

    /// API collection path segment (`/api/<collection>`).
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Organization => "organizations",
            Self::Environment => "environments",
            Self::OperatingSystem => "operatingsystems",
            Self::Domain => "domains",
            Self::Architecture => "architectures",
            Self::PartitionTable => "ptables",
        }
    }

    /// Key that wraps a single record in API responses (`{"ptable": {...}}`).
    #[must_use]
    pub const fn record_key(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Environment => "environment",
            Self::OperatingSystem => "operatingsystem",
            Self::Domain => "domain",
            Self::Architecture => "architecture",
            Self::PartitionTable => "ptable",
        }
    }

    /// Returns true if display names encode several remote fields.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::OperatingSystem)
    }

    /// Returns true if a lookup may legitimately carry neither name nor id.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::PartitionTable)
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "organization" | "organizations" | "org" => Some(Self::Organization),
            "environment" | "environments" | "env" => Some(Self::Environment),
            "operating_system" | "operating-system" | "operatingsystem" | "operatingsystems"
            | "os" => Some(Self::OperatingSystem),
            "domain" | "domains" => Some(Self::Domain),
            "architecture" | "architectures" | "arch" => Some(Self::Architecture),
            "partition_table" | "partition-table" | "ptable" | "ptables" => {
                Some(Self::PartitionTable)
            },
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown entity kind '{s}'")))
    }
}

/// Opaque remote identifier.
///
/// The API family returns integers for most kinds, but nothing here depends
/// on that; string identifiers are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric identifier.
    Number(u64),
    /// Any other identifier.
    Text(String),
}

impl EntityId {
    /// Parses an identifier read from a CSV cell.
    ///
    /// Digits-only values become [`EntityId::Number`]; everything else is
    /// kept as text. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("empty identifier".to_string()));
        }
        Ok(trimmed
            .parse::<u64>()
            .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Number))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A remote entity as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Remote identifier.
    pub id: EntityId,
    /// Canonical name field.
    pub name: String,
    /// Major version (operating systems only).
    pub major: Option<String>,
    /// Minor version (operating systems only).
    pub minor: Option<String>,
}

impl EntityRecord {
    /// Creates a record with a plain name.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            major: None,
            minor: None,
        }
    }

    /// Sets the version fields.
    #[must_use]
    pub fn with_version(mut self, major: impl Into<String>, minor: impl Into<String>) -> Self {
        self.major = Some(major.into());
        self.minor = Some(minor.into());
        self
    }

    /// Builds the name shown in CSV files for this record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCompositeName`] if a composite record carries
    /// a minor version without a major one.
    pub fn display_name(&self, kind: EntityKind) -> Result<String> {
        if !kind.is_composite() {
            return Ok(self.name.clone());
        }
        compose(
            &self.name,
            self.major.as_deref().unwrap_or(""),
            self.minor.as_deref().unwrap_or(""),
        )
    }
}
