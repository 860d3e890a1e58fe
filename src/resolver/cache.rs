//! Per-kind name↔id resolver cache.

use crate::models::{EntityId, EntityKind, decompose};
use crate::remote::{DirectoryClient, SearchPredicate};
use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// What the caller knows about an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Resolve this display name to an id.
    Name(&'a str),
    /// Resolve this id to a display name.
    Id(&'a EntityId),
    /// Neither is known.
    Nothing,
}

impl<'a> Lookup<'a> {
    /// Builds a lookup from optional CSV cells; a non-blank name wins over an id.
    #[must_use]
    pub fn from_options(name: Option<&'a str>, id: Option<&'a EntityId>) -> Self {
        match (name.filter(|n| !n.trim().is_empty()), id) {
            (Some(name), _) => Self::Name(name),
            (None, Some(id)) => Self::Id(id),
            (None, None) => Self::Nothing,
        }
    }
}

/// Outcome of [`ResolverCache::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A name was resolved to this id.
    Id(EntityId),
    /// An id was resolved to this name.
    Name(String),
    /// Optional kind, nothing to resolve.
    Empty,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
            Self::Empty => Ok(()),
        }
    }
}

/// Hit/miss counters for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Cached `(name, id)` pairs.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the remote directory.
    pub misses: u64,
}

/// Two-way map kept consistent under one lock.
#[derive(Debug, Default)]
struct NameIdMap {
    forward: HashMap<String, EntityId>,
    reverse: HashMap<EntityId, String>,
}

impl NameIdMap {
    /// Records a pair, evicting any older pair that shares its name or id.
    fn insert(&mut self, kind: EntityKind, name: String, id: EntityId) {
        if let Some(old_id) = self.forward.remove(&name) {
            self.reverse.remove(&old_id);
        }
        if let Some(old_name) = self.reverse.remove(&id) {
            tracing::warn!(
                kind = %kind,
                id = %id,
                old_name = %old_name,
                new_name = %name,
                "Remote id seen under two names, keeping the latest"
            );
            self.forward.remove(&old_name);
        }
        self.forward.insert(name.clone(), id.clone());
        self.reverse.insert(id, name);
    }
}

/// Memoizing resolver for one entity kind.
///
/// Both directions consult a single cache that is populated lazily and never
/// invalidated; one instance lives for one command invocation.
///
/// # Thread Safety
///
/// The map sits behind a `Mutex` that is held across the whole
/// check → remote call → store sequence, so concurrent misses for this kind
/// are serialized and each name or id costs at most one remote call. Caches
/// for different kinds do not contend.
///
/// A panic in the directory client poisons the lock without touching the map,
/// so a poisoned lock is recovered rather than propagated.
pub struct ResolverCache {
    kind: EntityKind,
    client: Arc<dyn DirectoryClient>,
    map: Mutex<NameIdMap>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolverCache {
    /// Creates an empty cache for `kind`.
    #[must_use]
    pub fn new(kind: EntityKind, client: Arc<dyn DirectoryClient>) -> Self {
        Self {
            kind,
            client,
            map: Mutex::new(NameIdMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The entity kind this cache resolves.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Resolves a display name to its remote id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the search matches nothing,
    /// [`Error::MalformedCompositeName`] for unparseable composite names, or
    /// the directory client's error.
    pub fn resolve_id(&self, name: &str) -> Result<EntityId> {
        let name = self.canonical_name(name)?;
        let mut map = self.lock();
        if let Some(id) = map.forward.get(name.as_ref()) {
            self.record_hit("id");
            return Ok(id.clone());
        }
        self.record_miss("id");

        let id = self.search_remote(&name)?;
        map.insert(self.kind, name.into_owned(), id.clone());
        Ok(id)
    }

    /// Resolves a remote id to its display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id does not exist,
    /// [`Error::MalformedCompositeName`] if the record cannot be displayed, or
    /// the directory client's error.
    pub fn resolve_name(&self, id: &EntityId) -> Result<String> {
        let mut map = self.lock();
        if let Some(name) = map.reverse.get(id) {
            self.record_hit("name");
            return Ok(name.clone());
        }
        self.record_miss("name");

        let name = self.fetch_remote(id)?;
        map.insert(self.kind, name.clone(), id.clone());
        Ok(name)
    }

    /// Resolves whichever side of the pair is known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for [`Lookup::Nothing`] unless the kind
    /// is optional, plus any error of [`Self::resolve_id`] or
    /// [`Self::resolve_name`].
    pub fn resolve(&self, lookup: Lookup<'_>) -> Result<Resolution> {
        match lookup {
            Lookup::Name(name) => self.resolve_id(name).map(Resolution::Id),
            Lookup::Id(id) => self.resolve_name(id).map(Resolution::Name),
            Lookup::Nothing if self.kind.is_optional() => Ok(Resolution::Empty),
            Lookup::Nothing => Err(Error::InvalidInput(format!(
                "{} lookup needs a name or an id",
                self.kind
            ))),
        }
    }

    /// Returns the number of cached pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().forward.len()
    }

    /// Returns true if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Composite names are keyed by their composed form, so spacing
    /// variants of one name share an entry.
    fn canonical_name<'a>(&self, name: &'a str) -> Result<Cow<'a, str>> {
        if !self.kind.is_composite() {
            return Ok(Cow::Borrowed(name));
        }
        let display = decompose(name)?.to_display()?;
        Ok(if display == name {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(display)
        })
    }

    fn lock(&self) -> MutexGuard<'_, NameIdMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip(self), fields(kind = %self.kind, client = self.client.name()))]
    fn search_remote(&self, name: &str) -> Result<EntityId> {
        let predicate = SearchPredicate::for_name(self.kind, name)?;
        let records = self
            .client
            .search(self.kind, &predicate)
            .inspect_err(|e| tracing::warn!(error = %e, "Remote search failed"))?;
        let record = records.into_iter().next().ok_or_else(|| Error::NotFound {
            kind: self.kind,
            key: name.to_string(),
        })?;
        tracing::debug!(id = %record.id, "Resolved name");
        Ok(record.id)
    }

    #[instrument(skip(self), fields(kind = %self.kind, client = self.client.name()))]
    fn fetch_remote(&self, id: &EntityId) -> Result<String> {
        let record = self
            .client
            .fetch_by_id(self.kind, id)
            .inspect_err(|e| tracing::warn!(error = %e, "Remote fetch failed"))?;
        let name = record.display_name(self.kind)?;
        tracing::debug!(name = %name, "Resolved id");
        Ok(name)
    }

    fn record_hit(&self, direction: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "resolver_cache_hits_total",
            "kind" => self.kind.as_str(),
            "direction" => direction
        )
        .increment(1);
    }

    fn record_miss(&self, direction: &'static str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "resolver_cache_misses_total",
            "kind" => self.kind.as_str(),
            "direction" => direction
        )
        .increment(1);
    }
}

impl fmt::Debug for ResolverCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverCache")
            .field("kind", &self.kind)
            .field("client", &self.client.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityRecord;
    use std::sync::atomic::AtomicUsize;

    /// Directory double that counts calls.
    #[derive(Default)]
    struct CountingDirectory {
        records: Vec<EntityRecord>,
        searches: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl CountingDirectory {
        fn with(records: Vec<EntityRecord>) -> Arc<Self> {
            Arc::new(Self {
                records,
                ..Self::default()
            })
        }
    }

    impl DirectoryClient for CountingDirectory {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn search(
            &self,
            _kind: EntityKind,
            predicate: &SearchPredicate,
        ) -> Result<Vec<EntityRecord>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .iter()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect())
        }

        fn fetch_by_id(&self, kind: EntityKind, id: &EntityId) -> Result<EntityRecord> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.records
                .iter()
                .find(|r| &r.id == id)
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    kind,
                    key: id.to_string(),
                })
        }
    }

    fn org_cache() -> (Arc<CountingDirectory>, ResolverCache) {
        let dir = CountingDirectory::with(vec![
            EntityRecord::new(7u64, "Library"),
            EntityRecord::new(8u64, "Default Organization"),
        ]);
        let cache = ResolverCache::new(EntityKind::Organization, dir.clone());
        (dir, cache)
    }

    #[test]
    fn test_resolve_id_searches_once() {
        let (dir, cache) = org_cache();
        assert!(cache.is_empty());

        assert_eq!(cache.resolve_id("Library").unwrap(), EntityId::Number(7));
        assert_eq!(cache.resolve_id("Library").unwrap(), EntityId::Number(7));

        assert_eq!(dir.searches.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_resolve_name_after_resolve_id_is_free() {
        let (dir, cache) = org_cache();
        cache.resolve_id("Library").unwrap();

        assert_eq!(cache.resolve_name(&EntityId::Number(7)).unwrap(), "Library");
        assert_eq!(dir.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_name_fetches_once() {
        let (dir, cache) = org_cache();
        let id = EntityId::Number(8);

        assert_eq!(cache.resolve_name(&id).unwrap(), "Default Organization");
        assert_eq!(cache.resolve_name(&id).unwrap(), "Default Organization");
        assert_eq!(cache.resolve_id("Default Organization").unwrap(), id);

        assert_eq!(dir.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(dir.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_found_is_not_cached() {
        let (dir, cache) = org_cache();

        for _ in 0..2 {
            let err = cache.resolve_id("Missing").unwrap_err();
            assert!(matches!(err, Error::NotFound { kind: EntityKind::Organization, ref key } if key == "Missing"));
        }
        assert_eq!(dir.searches.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_operating_system_uses_composite_names() {
        let dir = CountingDirectory::with(vec![
            EntityRecord::new(1u64, "RedHat").with_version("7", "2"),
            EntityRecord::new(2u64, "RedHat").with_version("6", ""),
        ]);
        let cache = ResolverCache::new(EntityKind::OperatingSystem, dir.clone());

        assert_eq!(cache.resolve_id("RedHat 6").unwrap(), EntityId::Number(2));
        assert_eq!(cache.resolve_name(&EntityId::Number(1)).unwrap(), "RedHat 7.2");
        assert_eq!(cache.resolve_id("RedHat 7.2").unwrap(), EntityId::Number(1));
        assert_eq!(dir.searches.load(Ordering::SeqCst), 1);
        assert_eq!(dir.fetches.load(Ordering::SeqCst), 1);

        assert!(matches!(
            cache.resolve_id("Red Hat 7.2"),
            Err(Error::MalformedCompositeName(_))
        ));
    }

    #[test]
    fn test_composite_spacing_variants_share_one_entry() {
        let dir = CountingDirectory::with(vec![
            EntityRecord::new(1u64, "RedHat").with_version("7", "2"),
        ]);
        let cache = ResolverCache::new(EntityKind::OperatingSystem, dir.clone());

        for _ in 0..5 {
            assert_eq!(cache.resolve_id("RedHat  7.2").unwrap(), EntityId::Number(1));
            assert_eq!(cache.resolve_id("RedHat 7.2").unwrap(), EntityId::Number(1));
        }

        assert_eq!(dir.searches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resolve_name(&EntityId::Number(1)).unwrap(), "RedHat 7.2");
        assert_eq!(dir.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_lookup_variants() {
        let (_, cache) = org_cache();
        let id = EntityId::Number(7);

        assert_eq!(
            cache.resolve(Lookup::Name("Library")).unwrap(),
            Resolution::Id(id.clone())
        );
        assert_eq!(
            cache.resolve(Lookup::Id(&id)).unwrap(),
            Resolution::Name("Library".to_string())
        );
        assert!(matches!(
            cache.resolve(Lookup::Nothing),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_partition_table_allows_nothing() {
        let dir = CountingDirectory::with(Vec::new());
        let cache = ResolverCache::new(EntityKind::PartitionTable, dir.clone());

        let resolution = cache.resolve(Lookup::from_options(Some("  "), None)).unwrap();
        assert_eq!(resolution, Resolution::Empty);
        assert_eq!(resolution.to_string(), "");
        assert_eq!(dir.searches.load(Ordering::SeqCst), 0);
        assert_eq!(dir.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lookup_from_options_prefers_name() {
        let id = EntityId::Number(1);
        assert_eq!(Lookup::from_options(Some("x"), Some(&id)), Lookup::Name("x"));
        assert_eq!(Lookup::from_options(None, Some(&id)), Lookup::Id(&id));
        assert_eq!(Lookup::from_options(Some(""), None), Lookup::Nothing);
    }

    #[test]
    fn test_insert_keeps_one_name_per_id() {
        let mut map = NameIdMap::default();
        map.insert(EntityKind::Domain, "a".to_string(), EntityId::Number(1));
        map.insert(EntityKind::Domain, "b".to_string(), EntityId::Number(1));

        assert_eq!(map.forward.len(), 1);
        assert_eq!(map.reverse.len(), 1);
        assert_eq!(map.reverse.get(&EntityId::Number(1)).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_concurrent_misses_issue_one_search() {
        let (dir, cache) = org_cache();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| cache.resolve_id("Library").unwrap());
            }
        });
        assert_eq!(dir.searches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 7);
    }
}
