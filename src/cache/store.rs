//! Cache storage: serialized response payloads keyed by `(resource, scope, view)`.
//!
//! Entries expire by wall-clock TTL and are evicted lazily on the next
//! lookup; there is no background sweep. Capacity is bounded by LRU.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use tokio::sync::watch;

use crate::domain::types::{ResourceType, Scope};
use crate::infra::upstream::UpstreamError;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) type FillResult = Result<Bytes, UpstreamError>;
pub(crate) type FillSlot = Option<FillResult>;

/// One fill underway for a key. The token identifies which fill currently
/// owns the key; a delete or a successor fill retires it.
struct PendingFill {
    receiver: watch::Receiver<FillSlot>,
    token: u64,
}

/// Outcome of registering interest in a missing key.
pub(crate) enum FillAttempt {
    /// The caller owns the fill: run the producer and publish via the sender.
    Started {
        sender: watch::Sender<FillSlot>,
        receiver: watch::Receiver<FillSlot>,
        token: u64,
    },
    /// Another caller's fill is underway; wait on its receiver.
    Joined(watch::Receiver<FillSlot>),
}

/// A stored payload with its freshness window. Immutable once stored; a new
/// `set` replaces the entry wholesale.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.stored_at + self.ttl
    }
}

enum Lookup {
    Fresh(Bytes),
    Expired,
    Absent,
}

/// In-process key/value container for response payloads.
///
/// Owns every entry: no other component holds a payload reference outside a
/// `get` return value (which is a cheap `Bytes` clone).
pub struct CacheStore {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
    pending: DashMap<CacheKey, PendingFill>,
    fill_tokens: AtomicU64,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            pending: DashMap::new(),
            fill_tokens: AtomicU64::new(0),
        }
    }

    /// Look up a key. An expired entry reads as absent and is removed as a
    /// side effect.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let lookup = match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Lookup::Fresh(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Absent,
        };
        match lookup {
            Lookup::Fresh(value) => Some(value),
            Lookup::Expired => {
                entries.pop(key);
                None
            }
            Lookup::Absent => None,
        }
    }

    /// Store a payload, unconditionally replacing any existing entry.
    pub fn set(&self, key: CacheKey, value: Bytes, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(key, entry);
    }

    /// Remove one key, retiring any fill underway for it. A retired fill
    /// still reports to its waiters but can no longer populate the store,
    /// and the next lookup starts a fresh fill. Removing an absent key is a
    /// no-op.
    pub fn delete(&self, key: &CacheKey) {
        self.pending.remove(key);
        rw_write(&self.entries, SOURCE, "delete").pop(key);
    }

    /// Remove every entry for `(resource, scope)` regardless of view,
    /// retiring matching fills too.
    ///
    /// This is how "invalidate all cached views of resource T for this
    /// scope" works without tracking individual entity ids. Returns the
    /// number of entries removed.
    pub fn delete_by_prefix(&self, resource: ResourceType, scope: &Scope) -> usize {
        self.pending
            .retain(|key, _| !key.matches_prefix(resource, scope));
        let mut entries = rw_write(&self.entries, SOURCE, "delete_by_prefix");
        let matching: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.matches_prefix(resource, scope))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            entries.pop(key);
        }
        matching.len()
    }

    /// Drop every entry and retire every fill.
    pub fn clear(&self) {
        self.pending.clear();
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Register a fill for `key`, joining one already underway.
    pub(crate) fn begin_fill(&self, key: &CacheKey) -> FillAttempt {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(occupied) => FillAttempt::Joined(occupied.get().receiver.clone()),
            Entry::Vacant(vacant) => {
                let token = self.fill_tokens.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = watch::channel(None);
                vacant.insert(PendingFill {
                    receiver: receiver.clone(),
                    token,
                });
                FillAttempt::Started {
                    sender,
                    receiver,
                    token,
                }
            }
        }
    }

    /// Retire a fill and store its payload, but only while the fill still
    /// owns its key. A fill overtaken by a delete (or by a successor fill
    /// started after that delete) must not repopulate the cache with what it
    /// fetched before the mutation.
    pub(crate) fn finish_fill(
        &self,
        key: &CacheKey,
        token: u64,
        payload: Option<(Bytes, Duration)>,
    ) {
        let owned = self
            .pending
            .remove_if(key, |_, fill| fill.token == token)
            .is_some();
        if owned {
            if let Some((value, ttl)) = payload {
                self.set(key.clone(), value, ttl);
            }
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use uuid::Uuid;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    fn payload(text: &str) -> Bytes {
        Bytes::from(text.to_string())
    }

    #[test]
    fn set_then_get_roundtrip() {
        let store = store();
        let key = CacheKey::detail(ResourceType::User, Scope::Global, "u1");

        assert!(store.get(&key).is_none());
        store.set(key.clone(), payload("{\"id\":\"u1\"}"), TTL);
        assert_eq!(store.get(&key), Some(payload("{\"id\":\"u1\"}")));
    }

    #[test]
    fn set_overwrites_unconditionally() {
        let store = store();
        let key = CacheKey::list(ResourceType::Blog, Scope::Global);

        store.set(key.clone(), payload("old"), TTL);
        store.set(key.clone(), payload("new"), TTL);
        assert_eq!(store.get(&key), Some(payload("new")));
    }

    #[test]
    fn zero_ttl_reads_as_absent_and_is_removed() {
        let store = store();
        let key = CacheKey::count(ResourceType::User, Scope::Global);

        store.set(key.clone(), payload("5"), Duration::ZERO);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key).is_none());
        // Lazy eviction happened on lookup.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn delete_absent_key_is_noop() {
        let store = store();
        let key = CacheKey::list(ResourceType::Role, Scope::Global);
        store.delete(&key);
        assert!(store.is_empty());
    }

    #[test]
    fn delete_by_prefix_drops_all_views_of_one_scope() {
        let store = store();
        let a = Scope::Workplace(Uuid::from_u128(1));
        let b = Scope::Workplace(Uuid::from_u128(2));

        store.set(
            CacheKey::detail(ResourceType::WorkspaceFolder, a, "f1"),
            payload("f1"),
            TTL,
        );
        store.set(
            CacheKey::list(ResourceType::WorkspaceFolder, a),
            payload("[..]"),
            TTL,
        );
        store.set(
            CacheKey::count(ResourceType::WorkspaceFolder, a),
            payload("2"),
            TTL,
        );
        store.set(
            CacheKey::list(ResourceType::WorkspaceFolder, b),
            payload("[..]"),
            TTL,
        );
        store.set(CacheKey::list(ResourceType::Media, a), payload("[..]"), TTL);

        let removed = store.delete_by_prefix(ResourceType::WorkspaceFolder, &a);
        assert_eq!(removed, 3);

        // Other scope and other resource are untouched.
        assert!(
            store
                .get(&CacheKey::list(ResourceType::WorkspaceFolder, b))
                .is_some()
        );
        assert!(store.get(&CacheKey::list(ResourceType::Media, a)).is_some());
    }

    #[test]
    fn lru_evicts_least_recent() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = CacheStore::new(&config);

        let k1 = CacheKey::detail(ResourceType::User, Scope::Global, "u1");
        let k2 = CacheKey::detail(ResourceType::User, Scope::Global, "u2");
        let k3 = CacheKey::detail(ResourceType::User, Scope::Global, "u3");

        store.set(k1.clone(), payload("1"), TTL);
        store.set(k2.clone(), payload("2"), TTL);
        store.set(k3.clone(), payload("3"), TTL);

        assert!(store.get(&k1).is_none());
        assert!(store.get(&k2).is_some());
        assert!(store.get(&k3).is_some());
    }

    #[test]
    fn clear_empties_the_store() {
        let store = store();
        store.set(
            CacheKey::list(ResourceType::Blog, Scope::Global),
            payload("[]"),
            TTL,
        );
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn second_caller_joins_a_pending_fill() {
        let store = store();
        let key = CacheKey::list(ResourceType::User, Scope::Global);

        assert!(matches!(
            store.begin_fill(&key),
            FillAttempt::Started { .. }
        ));
        assert!(matches!(store.begin_fill(&key), FillAttempt::Joined(_)));
    }

    #[test]
    fn delete_retires_the_pending_fill() {
        let store = store();
        let key = CacheKey::list(ResourceType::User, Scope::Global);

        let FillAttempt::Started { token, .. } = store.begin_fill(&key) else {
            panic!("first fill should start");
        };
        store.delete(&key);
        store.finish_fill(&key, token, Some((payload("pre-delete"), TTL)));

        // The retired fill stored nothing, and the key is fillable again.
        assert!(store.get(&key).is_none());
        assert!(matches!(
            store.begin_fill(&key),
            FillAttempt::Started { .. }
        ));
    }

    #[test]
    fn retired_fill_cannot_displace_its_successor() {
        let store = store();
        let key = CacheKey::count(ResourceType::Blog, Scope::Global);

        let FillAttempt::Started { token: stale, .. } = store.begin_fill(&key) else {
            panic!("first fill should start");
        };
        store.delete(&key);
        let FillAttempt::Started { token: fresh, .. } = store.begin_fill(&key) else {
            panic!("successor fill should start");
        };

        store.finish_fill(&key, stale, Some((payload("9"), TTL)));
        assert!(store.get(&key).is_none());

        store.finish_fill(&key, fresh, Some((payload("10"), TTL)));
        assert_eq!(store.get(&key), Some(payload("10")));
    }

    #[test]
    fn prefix_delete_retires_matching_fills_only() {
        let store = store();
        let a = Scope::Workplace(Uuid::from_u128(1));
        let b = Scope::Workplace(Uuid::from_u128(2));
        let key_a = CacheKey::list(ResourceType::WorkspaceFolder, a);
        let key_b = CacheKey::list(ResourceType::WorkspaceFolder, b);

        let FillAttempt::Started { token: token_a, .. } = store.begin_fill(&key_a) else {
            panic!("fill for scope a should start");
        };
        let FillAttempt::Started { token: token_b, .. } = store.begin_fill(&key_b) else {
            panic!("fill for scope b should start");
        };

        store.delete_by_prefix(ResourceType::WorkspaceFolder, &a);

        store.finish_fill(&key_a, token_a, Some((payload("[\"a\"]"), TTL)));
        store.finish_fill(&key_b, token_b, Some((payload("[\"b\"]"), TTL)));
        assert!(store.get(&key_a).is_none());
        assert_eq!(store.get(&key_b), Some(payload("[\"b\"]")));
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("entries lock");
            panic!("poison entries lock");
        }));

        let key = CacheKey::list(ResourceType::Role, Scope::Global);
        store.set(key.clone(), payload("[]"), TTL);
        assert!(store.get(&key).is_some());
    }
}
