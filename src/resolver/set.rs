//! The per-invocation collection of resolver caches.

use super::cache::{CacheStats, ResolverCache};
use crate::models::EntityKind;
use crate::remote::DirectoryClient;
use std::sync::Arc;

/// One [`ResolverCache`] for every [`EntityKind`], sharing a directory client.
#[derive(Debug)]
pub struct ResolverSet {
    caches: Vec<ResolverCache>,
}

impl ResolverSet {
    /// Creates empty caches for all kinds.
    #[must_use]
    pub fn new(client: Arc<dyn DirectoryClient>) -> Self {
        let caches = EntityKind::all()
            .iter()
            .map(|kind| ResolverCache::new(*kind, Arc::clone(&client)))
            .collect();
        Self { caches }
    }

    /// Returns the cache for `kind`.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> &ResolverCache {
        &self.caches[kind.index()]
    }

    /// Organization resolver.
    #[must_use]
    pub fn organization(&self) -> &ResolverCache {
        self.get(EntityKind::Organization)
    }

    /// Environment resolver.
    #[must_use]
    pub fn environment(&self) -> &ResolverCache {
        self.get(EntityKind::Environment)
    }

    /// Operating system resolver.
    #[must_use]
    pub fn operating_system(&self) -> &ResolverCache {
        self.get(EntityKind::OperatingSystem)
    }

    /// Domain resolver.
    #[must_use]
    pub fn domain(&self) -> &ResolverCache {
        self.get(EntityKind::Domain)
    }

    /// Architecture resolver.
    #[must_use]
    pub fn architecture(&self) -> &ResolverCache {
        self.get(EntityKind::Architecture)
    }

    /// Partition table resolver.
    #[must_use]
    pub fn partition_table(&self) -> &ResolverCache {
        self.get(EntityKind::PartitionTable)
    }

    /// Returns counters for every kind that saw at least one lookup.
    #[must_use]
    pub fn stats(&self) -> Vec<(EntityKind, CacheStats)> {
        self.caches
            .iter()
            .map(|cache| (cache.kind(), cache.stats()))
            .filter(|(_, stats)| stats.hits + stats.misses > 0)
            .collect()
    }
}
