//! # csvbridge
//!
//! Bulk CSV import/export against a remote management API.
//!
//! CSV files reference remote entities (organizations, environments,
//! operating systems, domains, architectures, partition tables) by their
//! human-readable names, while the API speaks in opaque identifiers.
//! csvbridge translates between the two with one memoizing resolver per
//! entity kind and fans rows out across a fixed pool of worker threads.
//!
//! ## Features
//!
//! - Bidirectional name↔id caches, one lock per entity kind
//! - Composite operating-system names (`"RedHat 7.2"`)
//! - Chunked parallel row dispatch with aggregated failure reporting
//! - Blocking HTTP directory client with basic auth
//!
//! ## Example
//!
//! ```rust,ignore
//! use csvbridge::{EntityKind, ResolverSet, RowDispatcher};
//!
//! let resolvers = ResolverSet::new(client);
//! let report = RowDispatcher::new(4)?.run(&rows, |row| {
//!     let org = resolvers.get(EntityKind::Organization).resolve_id(row.get("organization")?)?;
//!     apply(row, org)
//! })?;
//! println!("processed {} rows", report.processed);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod io;
pub mod models;
pub mod naming;
pub mod observability;
pub mod remote;
pub mod resolver;

// Re-exports for convenience
pub use config::BridgeConfig;
pub use dispatch::{
    CancelFlag, DispatchReport, DispatchRow, DispatchState, FailurePolicy, RowDispatcher,
    RowFailure, chunk_bounds,
};
pub use io::{CsvRow, read_rows, write_rows};
pub use models::{CompositeName, EntityId, EntityKind, EntityRecord, compose, decompose};
pub use naming::namify;
pub use remote::{DirectoryClient, HttpDirectoryClient, SearchPredicate};
pub use resolver::{CacheStats, Lookup, Resolution, ResolverCache, ResolverSet};

/// Error type for csvbridge operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | A name search or id fetch returned no record |
/// | `RemoteCall` | Transport, HTTP status or decoding failures talking to the API |
/// | `MalformedCompositeName` | A display name is not `BASE[ MAJOR[.MINOR]]` |
/// | `DispatcherConfig` | A dispatcher was configured with zero threads |
/// | `RowsFailed` | One or more rows failed during a dispatch run |
/// | `InvalidInput` | Lookups without a key, bad name templates, missing CSV columns |
/// | `OperationFailed` | Local I/O, config parsing, logging initialization |
#[derive(Debug, ThisError)]
pub enum Error {
    /// No remote record matched.
    ///
    /// Raised when:
    /// - A `name="..."` search returns an empty list
    /// - A fetch by identifier answers 404
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Entity kind that was searched.
        kind: EntityKind,
        /// The name or identifier that did not match.
        key: String,
    },

    /// The remote directory call itself failed.
    #[error("remote call '{operation}' failed: {cause}")]
    RemoteCall {
        /// The remote operation.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A composite display name could not be parsed or built.
    #[error("malformed composite name: {0}")]
    MalformedCompositeName(String),

    /// The dispatcher was configured with an unusable worker count.
    #[error("dispatcher configuration error: {0}")]
    DispatcherConfig(String),

    /// Rows failed during a dispatch run.
    ///
    /// Holds every failure observed across all workers, ordered by row index.
    #[error("{} row(s) failed; first: {}", .0.len(), first_failure(.0))]
    RowsFailed(Vec<RowFailure>),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns a stable short label for the error kind.
    ///
    /// Used as a log field and metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::RemoteCall { .. } => "remote_call",
            Self::MalformedCompositeName(_) => "malformed_composite_name",
            Self::DispatcherConfig(_) => "dispatcher_config",
            Self::RowsFailed(_) => "rows_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

fn first_failure(failures: &[RowFailure]) -> String {
    failures
        .first()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Result type alias for csvbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound {
            kind: EntityKind::Organization,
            key: "Library".to_string(),
        };
        assert_eq!(err.to_string(), "organization 'Library' not found");

        let err = Error::RemoteCall {
            operation: "search".to_string(),
            cause: "connect error".to_string(),
        };
        assert_eq!(err.to_string(), "remote call 'search' failed: connect error");

        let err = Error::DispatcherConfig("thread_count must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "dispatcher configuration error: thread_count must be at least 1"
        );
    }

    #[test]
    fn test_rows_failed_display_names_first_failure() {
        let err = Error::RowsFailed(vec![RowFailure {
            index: 3,
            row: "name=Library".to_string(),
            error: Error::NotFound {
                kind: EntityKind::Domain,
                key: "example.com".to_string(),
            },
        }]);
        let display = err.to_string();
        assert!(display.starts_with("1 row(s) failed"));
        assert!(display.contains("row 3"));
        assert!(display.contains("not_found"));
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(Error::InvalidInput(String::new()).kind(), "invalid_input");
        assert_eq!(
            Error::MalformedCompositeName(String::new()).kind(),
            "malformed_composite_name"
        );
        assert_eq!(Error::RowsFailed(Vec::new()).kind(), "rows_failed");
    }
}
