use std::{collections::HashMap, convert::Infallible, time::Duration};

use parking_lot::Mutex;

use crate::{CachedMapping, SystemClock, TimeSource};

/// Namespace of every shared cache key.
pub const SHARED_CACHE_PREFIX: &str = "tess:pid";

/// `tess:pid:{tenant}:{type}:{public_id}`.
pub fn shared_cache_key(tenant_id: i64, type_name: &str, public_id: &str) -> String {
    format!("{SHARED_CACHE_PREFIX}:{tenant_id}:{type_name}:{public_id}")
}

/// A cache shared between processes, typically a key-value server.
///
/// Failures are never fatal to resolution: the resolver logs them and falls
/// through to the mapping table.
pub trait SharedCache: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> Result<Option<CachedMapping>, Self::Error>;

    /// One result per key, in order.
    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<CachedMapping>>, Self::Error> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn put(&self, key: &str, mapping: CachedMapping, ttl: Duration) -> Result<(), Self::Error>;

    fn evict(&self, key: &str) -> Result<(), Self::Error>;
}

impl<C> SharedCache for std::sync::Arc<C>
where
    C: SharedCache + ?Sized,
{
    type Error = C::Error;

    fn get(&self, key: &str) -> Result<Option<CachedMapping>, Self::Error> {
        (**self).get(key)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<CachedMapping>>, Self::Error> {
        (**self).get_many(keys)
    }

    fn put(&self, key: &str, mapping: CachedMapping, ttl: Duration) -> Result<(), Self::Error> {
        (**self).put(key, mapping, ttl)
    }

    fn evict(&self, key: &str) -> Result<(), Self::Error> {
        (**self).evict(key)
    }
}

/// Placeholder for resolvers running without a shared tier.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSharedCache;

impl SharedCache for NoSharedCache {
    type Error = Infallible;

    fn get(&self, _key: &str) -> Result<Option<CachedMapping>, Self::Error> {
        Ok(None)
    }

    fn put(&self, _key: &str, _mapping: CachedMapping, _ttl: Duration) -> Result<(), Self::Error> {
        Ok(())
    }

    fn evict(&self, _key: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An in-process shared cache storing the same string values a key-value
/// server would.
#[derive(Debug, Default)]
pub struct MemorySharedCache<T = SystemClock>
where
    T: TimeSource<u64>,
{
    entries: Mutex<HashMap<String, (String, u64)>>,
    clock: T,
}

impl MemorySharedCache<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<T> MemorySharedCache<T>
where
    T: TimeSource<u64>,
{
    pub fn with_clock(clock: T) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored keys, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw stored value, if unexpired.
    pub fn raw(&self, key: &str) -> Option<String> {
        let now = self.clock.current_millis();
        self.entries
            .lock()
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone())
    }
}

impl<T> SharedCache for MemorySharedCache<T>
where
    T: TimeSource<u64> + Send + Sync,
{
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<CachedMapping>, Self::Error> {
        Ok(self
            .raw(key)
            .and_then(|value| CachedMapping::from_cache_value(&value)))
    }

    fn put(&self, key: &str, mapping: CachedMapping, ttl: Duration) -> Result<(), Self::Error> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = self.clock.current_millis().saturating_add(ttl_ms);
        self.entries
            .lock()
            .insert(key.to_owned(), (mapping.to_cache_value(), expires_at));
        Ok(())
    }

    fn evict(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, Ulid128};

    #[test]
    fn key_layout() {
        assert_eq!(
            shared_cache_key(42, "ORDER", "ord_01H"),
            "tess:pid:42:ORDER:ord_01H"
        );
    }

    #[test]
    fn memory_cache_honours_ttl() {
        let clock = ManualClock::new(10_000);
        let cache = MemorySharedCache::with_clock(clock.clone());
        let id = Ulid128::from_components(1_700_000_000_000, 5);

        cache
            .put("a", CachedMapping::Present(id), Duration::from_secs(1))
            .unwrap();
        cache
            .put("b", CachedMapping::Absent, Duration::from_millis(10))
            .unwrap();
        assert_eq!(cache.raw("b").as_deref(), Some("NULL"));
        assert_eq!(
            cache.get_many(&["a".into(), "b".into(), "c".into()]).unwrap(),
            vec![
                Some(CachedMapping::Present(id)),
                Some(CachedMapping::Absent),
                None
            ]
        );

        clock.advance(10);
        assert_eq!(cache.get("b").unwrap(), None);
        assert_eq!(cache.get("a").unwrap(), Some(CachedMapping::Present(id)));

        cache.evict("a").unwrap();
        assert_eq!(cache.get("a").unwrap(), None);
    }
}
