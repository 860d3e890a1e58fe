//! Name↔id resolution.
//!
//! One [`ResolverCache`] per entity kind, grouped in a [`ResolverSet`] that
//! lives for a single command invocation and is shared by every dispatcher
//! worker.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvbridge::{EntityId, EntityKind, ResolverSet};
//!
//! let resolvers = ResolverSet::new(client);
//! let org = resolvers.organization().resolve_id("Library")?;     // one search
//! let again = resolvers.organization().resolve_id("Library")?;   // cached
//! let name = resolvers.organization().resolve_name(&org)?;       // cached
//! ```

mod cache;
mod set;

pub use cache::{CacheStats, Lookup, Resolution, ResolverCache};
pub use set::ResolverSet;
