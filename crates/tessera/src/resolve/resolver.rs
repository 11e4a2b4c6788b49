use std::{
    collections::{HashMap, HashSet},
    iter,
    time::Duration,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    CachedMapping, ConfigError, InsertOutcome, NoSharedCache, PublicIdCodec, PublicIdMapRepository,
    PublicIdMapping, ResolveError, ResolveKey, ResolveMetrics, ResolveReason, ResolveResult,
    ResolverConfig, ResourceType, SharedCache, SystemClock, TimeSource, Ulid128,
    resolve::l1::{CacheKey, LocalCache},
};

/// A mapping staged by [`PublicIdResolver::register`], pending the commit of
/// its transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use = "pass to `committed` once the transaction commits"]
pub struct Registration {
    key: CacheKey,
}

impl Registration {
    pub fn tenant_id(&self) -> i64 {
        self.key.tenant_id
    }

    pub fn public_id(&self) -> &str {
        &self.key.public_id
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Maps public ids back to internal ids through a local cache, an optional
/// shared cache and the mapping table, in that order.
///
/// Found and not-found answers are both cached; not-found ones only for
/// [`ResolverConfig::negative_ttl`]. Input that fails validation is answered
/// without consulting any tier. Shared cache failures are logged and treated
/// as misses, mapping table failures are returned.
///
/// ```
/// use tessera::{
///     CodecConfig, MemoryPublicIdMapRepository, PublicIdCodec, PublicIdResolver, ResolveKey,
///     ResolveReason, ResolverConfig, ResourceType, Ulid128,
/// };
///
/// const ORDER: ResourceType = ResourceType::new("ORDER", "ord");
///
/// let codec = PublicIdCodec::new(CodecConfig::default()).unwrap();
/// let repo = MemoryPublicIdMapRepository::new();
/// let resolver = PublicIdResolver::new(ResolverConfig::default(), codec.clone(), repo).unwrap();
///
/// let id = Ulid128::from_components(1_700_000_000_000, 7);
/// let public = codec.encode(ORDER.prefix(), id).unwrap();
///
/// let mut tx = resolver.repository().begin();
/// let registration = resolver.register(&mut tx, 1, &ORDER, public.as_str(), id).unwrap();
/// resolver.repository().commit(tx).unwrap();
/// resolver.committed(registration);
///
/// let key = ResolveKey::new(1, ORDER, public.as_str());
/// assert_eq!(resolver.resolve(&key).unwrap().reason, ResolveReason::HitDb);
/// assert_eq!(resolver.resolve(&key).unwrap().reason, ResolveReason::HitL1);
/// ```
pub struct PublicIdResolver<R, C = NoSharedCache, T = SystemClock>
where
    R: PublicIdMapRepository,
    C: SharedCache,
    T: TimeSource<u64>,
{
    config: ResolverConfig,
    codec: PublicIdCodec,
    repository: R,
    shared: Option<C>,
    clock: T,
    local: LocalCache,
    metrics: ResolveMetrics,
}

impl<R> PublicIdResolver<R>
where
    R: PublicIdMapRepository,
{
    /// A resolver without a shared tier, reading the system clock.
    ///
    /// # Errors
    ///
    /// `l1_max_entries` and `batch_max_in` must be positive.
    pub fn new(
        config: ResolverConfig,
        codec: PublicIdCodec,
        repository: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            local: LocalCache::new(config.l1_max_entries),
            config,
            codec,
            repository,
            shared: None,
            clock: SystemClock,
            metrics: ResolveMetrics::default(),
        })
    }
}

impl<R, C, T> PublicIdResolver<R, C, T>
where
    R: PublicIdMapRepository,
    C: SharedCache,
    T: TimeSource<u64>,
{
    /// Adds a shared cache tier between the local cache and the table.
    pub fn with_shared_cache<C2>(self, shared: C2) -> PublicIdResolver<R, C2, T>
    where
        C2: SharedCache,
    {
        PublicIdResolver {
            config: self.config,
            codec: self.codec,
            repository: self.repository,
            shared: Some(shared),
            clock: self.clock,
            local: self.local,
            metrics: self.metrics,
        }
    }

    /// Replaces the clock used to expire local cache entries.
    pub fn with_clock<T2>(self, clock: T2) -> PublicIdResolver<R, C, T2>
    where
        T2: TimeSource<u64>,
    {
        PublicIdResolver {
            config: self.config,
            codec: self.codec,
            repository: self.repository,
            shared: self.shared,
            clock,
            local: self.local,
            metrics: self.metrics,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn codec(&self) -> &PublicIdCodec {
        &self.codec
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn shared_cache(&self) -> Option<&C> {
        self.shared.as_ref()
    }

    pub fn metrics(&self) -> &ResolveMetrics {
        &self.metrics
    }

    /// Entries currently held by the local cache, expired ones included.
    pub fn local_cache_len(&self) -> usize {
        self.local.len()
    }

    /// Returns the trimmed public id, or why the key is rejected.
    fn validate<'a>(
        &self,
        tenant_id: i64,
        resource_type: &ResourceType,
        public_id: &'a str,
    ) -> Result<(&'a str, Ulid128), ResolveReason> {
        let public_id = public_id.trim();
        if tenant_id <= 0 || public_id.is_empty() {
            return Err(ResolveReason::InvalidFormat);
        }
        let decoded = self
            .codec
            .decode(public_id)
            .map_err(|_| ResolveReason::InvalidFormat)?;
        if decoded.id_type != resource_type.prefix() {
            return Err(ResolveReason::PrefixMismatch);
        }
        Ok((public_id, decoded.internal_id))
    }

    fn reject(&self, reason: ResolveReason) -> ResolveResult {
        self.metrics.record_invalid();
        ResolveResult::rejected(reason)
    }

    /// Answers from the public id alone: validation plus the id it encodes.
    /// Used for resource types whose public id is a pure function of the
    /// internal id.
    pub fn derive(
        &self,
        tenant_id: i64,
        resource_type: &ResourceType,
        public_id: &str,
    ) -> ResolveResult {
        if !self.config.enabled {
            return ResolveResult::disabled();
        }
        match self.validate(tenant_id, resource_type, public_id) {
            Ok((_, internal_id)) => ResolveResult::found(internal_id, ResolveReason::Derived),
            Err(reason) => self.reject(reason),
        }
    }

    /// # Errors
    ///
    /// Only [`ResolveError::Repository`]. Bad input is reported through
    /// [`ResolveResult::reason`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, key), fields(tenant = key.tenant_id, public_id = %key.public_id))
    )]
    pub fn resolve(&self, key: &ResolveKey) -> Result<ResolveResult, ResolveError> {
        if !self.config.enabled {
            return Ok(ResolveResult::disabled());
        }
        let public_id = match self.validate(key.tenant_id, &key.resource_type, &key.public_id) {
            Ok((public_id, _)) => public_id,
            Err(reason) => return Ok(self.reject(reason)),
        };

        let type_name = key.resource_type.name();
        let cache_key = CacheKey::new(key.tenant_id, type_name, public_id);
        let now = self.clock.current_millis();

        if let Some(mapping) = self.local.get(&cache_key, now) {
            self.metrics.record_hit_l1();
            return Ok(mapping.into_result(ResolveReason::HitL1));
        }

        if let Some(mapping) = self.shared_get(&cache_key) {
            self.metrics.record_hit_l2();
            self.local_put(cache_key, mapping, now);
            return Ok(mapping.into_result(ResolveReason::HitL2));
        }

        let found = self
            .repository
            .find_internal_id(key.tenant_id, type_name, public_id)
            .map_err(|e| self.repository_error(e))?;
        Ok(self.record_lookup(cache_key, found, now))
    }

    /// Resolves many public ids of one type, keyed by the input strings.
    ///
    /// Invalid and unknown ids get their own result without failing the
    /// batch; duplicates are answered once. Ids not in the local cache are
    /// looked up with one shared cache round trip, then with mapping table
    /// queries of at most [`ResolverConfig::batch_max_in`] ids each.
    ///
    /// # Errors
    ///
    /// Only [`ResolveError::Repository`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, resource_type, public_ids), fields(tenant = tenant_id, len = public_ids.len()))
    )]
    pub fn resolve_batch<S>(
        &self,
        tenant_id: i64,
        resource_type: &ResourceType,
        public_ids: &[S],
    ) -> Result<HashMap<String, ResolveResult>, ResolveError>
    where
        S: AsRef<str>,
    {
        let mut results = HashMap::with_capacity(public_ids.len());
        if !self.config.enabled {
            for public_id in public_ids {
                results.insert(public_id.as_ref().to_owned(), ResolveResult::disabled());
            }
            return Ok(results);
        }

        let type_name = resource_type.name();
        let now = self.clock.current_millis();
        let mut seen = HashSet::with_capacity(public_ids.len());
        let mut pending: Vec<(&str, CacheKey)> = Vec::new();

        for raw in public_ids {
            let raw = raw.as_ref();
            if !seen.insert(raw) {
                continue;
            }
            match self.validate(tenant_id, resource_type, raw) {
                Err(reason) => {
                    results.insert(raw.to_owned(), self.reject(reason));
                }
                Ok((public_id, _)) => {
                    let key = CacheKey::new(tenant_id, type_name, public_id);
                    match self.local.get(&key, now) {
                        Some(mapping) => {
                            self.metrics.record_hit_l1();
                            results.insert(
                                raw.to_owned(),
                                mapping.into_result(ResolveReason::HitL1),
                            );
                        }
                        None => pending.push((raw, key)),
                    }
                }
            }
        }

        if pending.is_empty() {
            return Ok(results);
        }

        if let Some(shared) = &self.shared {
            let keys: Vec<String> = pending.iter().map(|(_, key)| key.shared_key()).collect();
            match shared.get_many(&keys) {
                Ok(found) => {
                    let mut missed = Vec::with_capacity(pending.len());
                    let found = found.into_iter().chain(iter::repeat(None));
                    for ((raw, key), mapping) in pending.into_iter().zip(found) {
                        match mapping {
                            Some(mapping) => {
                                self.metrics.record_hit_l2();
                                self.local_put(key, mapping, now);
                                results.insert(
                                    raw.to_owned(),
                                    mapping.into_result(ResolveReason::HitL2),
                                );
                            }
                            None => missed.push((raw, key)),
                        }
                    }
                    pending = missed;
                }
                Err(e) => self.shared_error("get_many", &e),
            }
        }

        for chunk in pending.chunks(self.config.batch_max_in) {
            let ids: Vec<&str> = chunk.iter().map(|(_, key)| key.public_id.as_str()).collect();
            let found = self
                .repository
                .find_many(tenant_id, type_name, &ids)
                .map_err(|e| self.repository_error(e))?;
            for (raw, key) in chunk {
                let internal_id = found.get(&key.public_id).copied();
                results.insert(
                    (*raw).to_owned(),
                    self.record_lookup(key.clone(), internal_id, now),
                );
            }
        }

        Ok(results)
    }

    /// Writes the mapping `public_id -> internal_id` through `tx`.
    ///
    /// The caller commits `tx` together with the row that owns `internal_id`
    /// and then hands the returned [`Registration`] to
    /// [`committed`](Self::committed), which drops any not-found answer the
    /// caches picked up while the row was invisible. Registering an identical
    /// mapping again is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidTenant`] for a tenant id below 1.
    /// - [`ResolveError::InvalidPublicId`] when the codec rejects the id.
    /// - [`ResolveError::PrefixMismatch`] when the id belongs to another type.
    /// - [`ResolveError::Conflict`] when the key maps to a different id.
    /// - [`ResolveError::Repository`] when the insert fails.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, tx, resource_type), fields(resource = %resource_type))
    )]
    pub fn register(
        &self,
        tx: &mut R::Tx,
        tenant_id: i64,
        resource_type: &ResourceType,
        public_id: &str,
        internal_id: Ulid128,
    ) -> Result<Registration, ResolveError> {
        if tenant_id <= 0 {
            return Err(ResolveError::InvalidTenant(tenant_id));
        }
        let public_id = public_id.trim();
        let decoded = self.codec.decode(public_id)?;
        if decoded.id_type != resource_type.prefix() {
            return Err(ResolveError::PrefixMismatch {
                expected: resource_type.prefix().to_owned(),
                got: decoded.id_type,
            });
        }

        let mapping = PublicIdMapping {
            tenant_id,
            type_name: resource_type.name().to_owned(),
            public_id: public_id.to_owned(),
            internal_id,
        };
        match self
            .repository
            .insert(tx, &mapping)
            .map_err(|e| self.repository_error(e))?
        {
            InsertOutcome::Inserted => {}
            InsertOutcome::Existing(existing) if existing == internal_id => {
                #[cfg(feature = "tracing")]
                tracing::debug!(public_id, "mapping already registered");
            }
            InsertOutcome::Existing(existing) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(public_id, %existing, requested = %internal_id, "conflicting mapping");
                return Err(ResolveError::Conflict {
                    public_id: mapping.public_id,
                    existing,
                    requested: internal_id,
                });
            }
        }

        Ok(Registration {
            key: CacheKey::new(tenant_id, resource_type.name(), public_id),
        })
    }

    /// Evicts the cached answers for a mapping whose transaction committed.
    ///
    /// Must run after the commit: a lookup racing the open transaction
    /// reads no row and caches a not-found answer for
    /// [`ResolverConfig::negative_ttl`].
    pub fn committed(&self, registration: Registration) {
        let key = registration.key;
        if let Some(shared) = &self.shared {
            if let Err(e) = shared.evict(&key.shared_key()) {
                self.shared_error("evict", &e);
            }
        }
        self.local.evict(&key);
    }

    fn record_lookup(&self, key: CacheKey, found: Option<Ulid128>, now: u64) -> ResolveResult {
        let (mapping, shared_ttl, result) = match found {
            Some(internal_id) => {
                self.metrics.record_hit_db();
                (
                    CachedMapping::Present(internal_id),
                    self.config.l2_ttl,
                    ResolveResult::found(internal_id, ResolveReason::HitDb),
                )
            }
            None => {
                self.metrics.record_miss();
                (
                    CachedMapping::Absent,
                    self.config.negative_ttl,
                    ResolveResult::not_found(),
                )
            }
        };
        if let Some(shared) = &self.shared {
            if let Err(e) = shared.put(&key.shared_key(), mapping, shared_ttl) {
                self.shared_error("put", &e);
            }
        }
        self.local_put(key, mapping, now);
        result
    }

    fn local_put(&self, key: CacheKey, mapping: CachedMapping, now: u64) {
        let ttl = match mapping {
            CachedMapping::Present(_) => self.config.l1_ttl,
            CachedMapping::Absent => self.config.negative_ttl,
        };
        self.local.put(key, mapping, now, millis(ttl));
    }

    fn shared_get(&self, key: &CacheKey) -> Option<CachedMapping> {
        let shared = self.shared.as_ref()?;
        match shared.get(&key.shared_key()) {
            Ok(mapping) => mapping,
            Err(e) => {
                self.shared_error("get", &e);
                None
            }
        }
    }

    #[cold]
    fn shared_error(&self, op: &'static str, err: &C::Error) {
        self.metrics.record_l2_error();
        #[cfg(feature = "tracing")]
        tracing::warn!(op, error = %err, "shared cache failed, falling through");
        #[cfg(not(feature = "tracing"))]
        let _ = (op, err);
    }

    #[cold]
    fn repository_error(&self, err: R::Error) -> ResolveError {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %err, "public id mapping lookup failed");
        ResolveError::repository(err)
    }
}
