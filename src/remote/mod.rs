//! Remote directory abstraction.
//!
//! The resolver caches only need two things from the remote API: an
//! exact-match search and a fetch by identifier. [`DirectoryClient`] is that
//! narrow seam; [`HttpDirectoryClient`] talks to a live server.

mod http;

pub use http::{HttpConfig, HttpDirectoryClient, build_http_client, parse_record, parse_records};

use crate::models::{EntityId, EntityKind, EntityRecord, decompose};
use crate::Result;
use std::fmt;

/// Read access to the remote entity directory.
pub trait DirectoryClient: Send + Sync {
    /// The client name, used in log fields.
    fn name(&self) -> &'static str;

    /// Returns every record of `kind` matching the predicate.
    ///
    /// An empty list means no match; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    fn search(&self, kind: EntityKind, predicate: &SearchPredicate) -> Result<Vec<EntityRecord>>;

    /// Fetches a single record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the identifier does not exist, or
    /// an error if the remote call fails.
    fn fetch_by_id(&self, kind: EntityKind, id: &EntityId) -> Result<EntityRecord>;
}

/// An exact-match search expression such as `name="Library"`.
///
/// Terms are joined with `and`. Values are double-quoted with embedded quotes
/// and backslashes escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPredicate {
    terms: Vec<(&'static str, String)>,
}

impl SearchPredicate {
    /// Creates a predicate with a single `field="value"` term.
    #[must_use]
    pub fn eq(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            terms: vec![(field, value.into())],
        }
    }

    /// Adds another `field="value"` term.
    #[must_use]
    pub fn and(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.terms.push((field, value.into()));
        self
    }

    /// Builds the name search for an entity kind.
    ///
    /// Composite kinds search on `name`, `major` and `minor` separately.
    ///
    /// # Errors
    ///
    /// Returns an error if a composite name is malformed.
    pub fn for_name(kind: EntityKind, name: &str) -> Result<Self> {
        if !kind.is_composite() {
            return Ok(Self::eq("name", name));
        }
        let parts = decompose(name)?;
        Ok(Self::eq("name", parts.base)
            .and("major", parts.major)
            .and("minor", parts.minor))
    }

    /// Returns the `(field, value)` terms.
    #[must_use]
    pub fn terms(&self) -> &[(&'static str, String)] {
        &self.terms
    }

    /// Returns true if a record satisfies every term.
    ///
    /// Missing version fields compare as empty strings. Useful for in-memory
    /// directories.
    #[must_use]
    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.terms.iter().all(|(field, value)| {
            let actual = match *field {
                "name" => record.name.as_str(),
                "major" => record.major.as_deref().unwrap_or(""),
                "minor" => record.minor.as_deref().unwrap_or(""),
                _ => return false,
            };
            actual == value
        })
    }
}

impl fmt::Display for SearchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "{field}=\"{escaped}\"")?;
        }
        Ok(())
    }
}
