//! Parameter-keyed store of live outcome cells.
//!
//! Unlike a value cache, entries here are [`AsyncOutcome`] cells: a lookup
//! during a fetch returns the same loading cell instead of starting a
//! second fetch, and a refetch runs in place so existing subscribers see
//! the entry go loading and settle again without re-resolving it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use surety_core::{AsyncOutcome, AsyncState, ListenOptions, OutcomeView, Subscription};
use surety_types::{DomainError, RefetchPolicy};

use crate::fetcher::{Fetcher, fetcher_fn};
use crate::key::default_key;

struct CacheEntry<V> {
    cell: AsyncOutcome<V>,
    /// Cleared by [`KeyedCache::invalidate`]; an invalid entry keeps
    /// serving its value but refetches on the next access.
    valid: bool,
    /// Claimed under the lock before a fetch is dispatched, so two racing
    /// lookups cannot start two fetches for one key.
    fetch_pending: bool,
    /// When the cell last settled. `None` until the first fetch resolves.
    settled_at: Option<Instant>,
    /// Keeps the settle watcher registered for the entry's lifetime.
    _settle_watch: Subscription,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
}

enum Lookup<P, V> {
    /// Fresh, loading, or policy says serve as-is.
    Hit(OutcomeView<V>),
    /// Caller claimed the fetch; dispatch it outside the lock.
    Fetch(AsyncOutcome<V>, P),
}

/// Parameter-keyed cache of async outcomes with TTL-based refetching.
///
/// Cloning shares the underlying store. Lookups hand out [`OutcomeView`]s,
/// so callers can observe and await entries but never drive them; all
/// mutation goes through the cache itself.
pub struct KeyedCache<P, V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    fetcher: Arc<dyn Fetcher<P, V>>,
    /// `None` means settled entries never age out.
    time_to_live: Option<Duration>,
    key_fn: Arc<dyn Fn(&P) -> String + Send + Sync>,
}

impl<P, V> Clone for KeyedCache<P, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            fetcher: Arc::clone(&self.fetcher),
            time_to_live: self.time_to_live,
            key_fn: Arc::clone(&self.key_fn),
        }
    }
}

impl<P, V> KeyedCache<P, V>
where
    P: Serialize + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(fetcher: Arc<dyn Fetcher<P, V>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
            })),
            fetcher,
            time_to_live: None,
            key_fn: Arc::new(|params: &P| default_key(params)),
        }
    }

    /// Builds a cache over an async closure instead of a [`Fetcher`] impl.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, DomainError>> + Send + 'static,
    {
        Self::new(fetcher_fn(f))
    }

    /// Sets the freshness window for the no-refetch policy. Without one,
    /// settled entries stay fresh until invalidated.
    #[must_use]
    pub fn with_ttl(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = Some(time_to_live);
        self
    }

    /// Replaces the key derivation. Useful when parameters do not
    /// serialize, or when several parameter values should share an entry.
    #[must_use]
    pub fn with_key_fn(mut self, key_fn: impl Fn(&P) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Arc::new(key_fn);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().expect("cache lock")
    }

    /// Watches a cell and stamps the entry's settle time on each
    /// resolution, also releasing the fetch claim.
    fn watch_settlement(&self, key: &str, cell: &AsyncOutcome<V>) -> Subscription {
        let weak = Arc::downgrade(&self.inner);
        let watched = key.to_string();
        cell.listen(
            move |state: &AsyncState<V>| {
                if !state.is_settled() {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut guard = inner.lock().expect("cache lock");
                if let Some(entry) = guard.entries.get_mut(&watched) {
                    entry.fetch_pending = false;
                    entry.settled_at = Some(Instant::now());
                }
            },
            ListenOptions::default(),
        )
    }

    /// Looks up the entry for `params`, fetching according to `policy`.
    ///
    /// A loading entry is always returned as-is, whatever the policy: the
    /// in-flight fetch already covers the request. A settled entry is
    /// served directly when the policy considers it fresh, and refetched in
    /// place otherwise, so every holder of the view observes the refresh.
    pub fn get(&self, params: P, policy: RefetchPolicy) -> OutcomeView<V> {
        let key = (self.key_fn)(&params);
        let lookup = {
            let mut inner = self.lock();
            match inner.entries.get_mut(&key) {
                Some(entry) => {
                    if entry.cell.is_loading() || entry.fetch_pending {
                        trace!(cache_key = %key, "lookup joined fetch in flight");
                        Lookup::Hit(entry.cell.view())
                    } else {
                        let stale = !entry.valid
                            || match policy {
                                RefetchPolicy::Refetch => true,
                                RefetchPolicy::IfError => entry.cell.is_error(),
                                RefetchPolicy::NoRefetch => {
                                    match (entry.settled_at, self.time_to_live) {
                                        (Some(at), Some(ttl)) => at.elapsed() >= ttl,
                                        (Some(_), None) => false,
                                        (None, _) => true,
                                    }
                                }
                            };
                        if stale {
                            entry.fetch_pending = true;
                            entry.valid = true;
                            debug!(cache_key = %key, policy = ?policy, "refetching entry");
                            Lookup::Fetch(entry.cell.clone(), params)
                        } else {
                            trace!(cache_key = %key, "lookup hit");
                            Lookup::Hit(entry.cell.view())
                        }
                    }
                }
                None => {
                    let cell = AsyncOutcome::idle();
                    let watch = self.watch_settlement(&key, &cell);
                    inner.entries.insert(
                        key.clone(),
                        CacheEntry {
                            cell: cell.clone(),
                            valid: true,
                            fetch_pending: true,
                            settled_at: None,
                            _settle_watch: watch,
                        },
                    );
                    debug!(cache_key = %key, "fetching new entry");
                    Lookup::Fetch(cell, params)
                }
            }
        };
        // The fetch dispatch happens outside the lock: starting a cycle
        // notifies the cell's listeners synchronously.
        match lookup {
            Lookup::Hit(view) => view,
            Lookup::Fetch(cell, params) => {
                let view = cell.view();
                let fetcher = Arc::clone(&self.fetcher);
                cell.run_in_place(move |_progress| async move { fetcher.fetch(params).await });
                view
            }
        }
    }

    /// Like [`KeyedCache::get`], but waits for the entry to settle and
    /// returns the resulting state.
    pub async fn get_settled(&self, params: P, policy: RefetchPolicy) -> AsyncState<V> {
        self.get(params, policy).wait_for_settled().await
    }

    /// Marks the entry for `params` stale without dropping its value. The
    /// next access refetches regardless of policy.
    pub fn invalidate(&self, params: &P) {
        let key = (self.key_fn)(params);
        self.invalidate_key(&key);
    }

    /// Marks the entry under a precomputed key stale.
    pub fn invalidate_key(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.valid = false;
            debug!(cache_key = %key, "entry invalidated");
        }
    }

    /// Marks every entry stale.
    pub fn invalidate_all(&self) {
        let mut inner = self.lock();
        for entry in inner.entries.values_mut() {
            entry.valid = false;
        }
        debug!(entry_count = inner.entries.len(), "all entries invalidated");
    }

    /// Drops every entry. Outstanding views keep their cells alive, but
    /// the cache forgets them; the next lookup builds a fresh cell.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        debug!(entry_count = dropped, "cache cleared");
    }

    /// True while any cached cell is loading.
    pub fn any_loading(&self) -> bool {
        let inner = self.lock();
        inner.entries.values().any(|entry| entry.cell.is_loading())
    }

    /// Current state of the entry for `params`, if one exists.
    pub fn entry_state(&self, params: &P) -> Option<AsyncState<V>> {
        let key = (self.key_fn)(params);
        let inner = self.lock();
        inner.entries.get(&key).map(|entry| entry.cell.state())
    }

    pub fn contains(&self, params: &P) -> bool {
        let key = (self.key_fn)(params);
        self.lock().entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl<P, V> fmt::Debug for KeyedCache<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("entries", &self.inner.lock().expect("cache lock").entries.len())
            .field("time_to_live", &self.time_to_live)
            .finish()
    }
}
