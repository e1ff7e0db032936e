//! Keyed tracking of in-flight and settled outcomes.
//!
//! A [`Collection`] watches a set of cells under caller-chosen keys and
//! folds their states into one [`AggregateState`]: any-loading or
//! all-settled. UI code typically keys a collection by request id and binds
//! a single spinner to the aggregate instead of one per cell.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::debug;

use surety_types::{AggregateState, DomainError, ListenOptions};

use crate::cell::{AsyncState, ListenerCallback, ListenerFate, OutcomeView, Subscription};

type AggregateCallback = Arc<dyn Fn(AggregateState) + Send + Sync>;

struct Tracked<T> {
    view: OutcomeView<T>,
    /// Dropped without unsubscribing; removal paths detach explicitly or
    /// let the listener discard itself.
    subscription: Subscription,
    remove_on_settle: bool,
}

struct CollectionInner<K, T> {
    entries: IndexMap<K, Tracked<T>>,
    listeners: IndexMap<u64, AggregateCallback>,
    next_listener: u64,
    /// Last aggregate delivered. Listeners only hear changes, not every
    /// underlying transition.
    last_broadcast: AggregateState,
}

/// Computes the aggregate and, when it changed since the last broadcast,
/// returns the callbacks to notify. Callbacks run outside the lock.
fn plan_broadcast<K, T: Clone + Send + 'static>(
    inner: &mut CollectionInner<K, T>,
) -> Option<(AggregateState, Vec<AggregateCallback>)> {
    let current = if inner.entries.values().any(|t| t.view.is_loading()) {
        AggregateState::AnyLoading
    } else {
        AggregateState::AllSettled
    };
    if current == inner.last_broadcast {
        return None;
    }
    inner.last_broadcast = current;
    Some((current, inner.listeners.values().cloned().collect()))
}

fn fire(broadcast: Option<(AggregateState, Vec<AggregateCallback>)>) {
    if let Some((aggregate, callbacks)) = broadcast {
        for callback in callbacks {
            callback(aggregate);
        }
    }
}

/// A set of cells tracked under keys, with a folded loading state.
///
/// Cloning shares the same set. Entries hold views, never owners, so the
/// collection can observe but not drive its members.
pub struct Collection<K, T> {
    inner: Arc<Mutex<CollectionInner<K, T>>>,
}

impl<K, T> Clone for Collection<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Collection<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CollectionInner {
                entries: IndexMap::new(),
                listeners: IndexMap::new(),
                next_listener: 0,
                last_broadcast: AggregateState::AllSettled,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectionInner<K, T>> {
        self.inner.lock().expect("collection lock")
    }

    /// Tracks a cell under `key`. An existing entry under the same key is
    /// replaced and its tracking torn down.
    pub fn add(&self, key: K, source: impl Into<OutcomeView<T>>) {
        self.insert(key, source.into(), false);
    }

    /// Tracks a cell that should evict itself once it settles.
    ///
    /// Returns false, tracking nothing, when the cell is already settled:
    /// there is nothing left to wait for and the entry would be removed
    /// immediately anyway.
    pub fn add_until_settled(&self, key: K, source: impl Into<OutcomeView<T>>) -> bool {
        let view = source.into();
        if view.is_settled() {
            debug!("already settled, not tracked");
            return false;
        }
        self.insert(key, view, true);
        true
    }

    fn insert(&self, key: K, view: OutcomeView<T>, remove_on_settle: bool) {
        let weak = Arc::downgrade(&self.inner);
        let watched_key = key.clone();
        let callback: ListenerCallback<T> = Arc::new(move |state: &AsyncState<T>| {
            let Some(inner) = weak.upgrade() else {
                return ListenerFate::Discard;
            };
            let mut discard = false;
            let broadcast = {
                let mut guard = inner.lock().expect("collection lock");
                let evict = state.is_settled()
                    && guard
                        .entries
                        .get(&watched_key)
                        .is_some_and(|tracked| tracked.remove_on_settle);
                if evict {
                    guard.entries.shift_remove(&watched_key);
                    discard = true;
                }
                plan_broadcast(&mut guard)
            };
            fire(broadcast);
            if discard {
                ListenerFate::Discard
            } else {
                ListenerFate::Keep
            }
        });
        // Subscribe before inserting so a settlement between the two is
        // not missed; the callback tolerates a not-yet-present entry.
        let subscription = view.listen_with_fate(callback, ListenOptions::default());
        let probe = view.clone();
        let (replaced, broadcast) = {
            let mut guard = self.lock();
            let replaced = guard.entries.insert(
                key.clone(),
                Tracked {
                    view,
                    subscription,
                    remove_on_settle,
                },
            );
            (replaced, plan_broadcast(&mut guard))
        };
        fire(broadcast);
        if let Some(old) = replaced {
            old.subscription.unsubscribe();
        }
        // The cell may have settled between the settled check and the
        // subscription; sweep it out rather than track it forever.
        if remove_on_settle && probe.is_settled() {
            self.remove(&key);
        }
    }

    /// Stops tracking `key`. Returns true when an entry was removed.
    pub fn remove(&self, key: &K) -> bool {
        let (removed, broadcast) = {
            let mut guard = self.lock();
            let removed = guard.entries.shift_remove(key);
            (removed, plan_broadcast(&mut guard))
        };
        fire(broadcast);
        match removed {
            Some(tracked) => {
                tracked.subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Drops every entry and its tracking.
    pub fn clear(&self) {
        let (dropped, broadcast) = {
            let mut guard = self.lock();
            let dropped: Vec<Tracked<T>> = guard.entries.drain(..).map(|(_, t)| t).collect();
            (dropped, plan_broadcast(&mut guard))
        };
        fire(broadcast);
        for tracked in dropped {
            tracked.subscription.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.lock().entries.keys().cloned().collect()
    }

    /// View of the entry under `key`, if tracked.
    pub fn get(&self, key: &K) -> Option<OutcomeView<T>> {
        self.lock().entries.get(key).map(|t| t.view.clone())
    }

    /// Live aggregate over the tracked entries. Empty folds to all-settled.
    pub fn aggregate_state(&self) -> AggregateState {
        if self.any_loading() {
            AggregateState::AnyLoading
        } else {
            AggregateState::AllSettled
        }
    }

    pub fn any_loading(&self) -> bool {
        let guard = self.lock();
        guard.entries.values().any(|t| t.view.is_loading())
    }

    /// Successfully settled entries with their values.
    pub fn success_values(&self) -> Vec<(K, T)> {
        let guard = self.lock();
        guard
            .entries
            .iter()
            .filter_map(|(key, t)| t.view.success_value().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Entries settled with an error.
    pub fn errors(&self) -> Vec<(K, DomainError)> {
        let guard = self.lock();
        guard
            .entries
            .iter()
            .filter_map(|(key, t)| t.view.error().map(|e| (key.clone(), e)))
            .collect()
    }

    /// Entries still loading; await these views to drain the collection.
    pub fn loading(&self) -> Vec<(K, OutcomeView<T>)> {
        let guard = self.lock();
        guard
            .entries
            .iter()
            .filter(|(_, t)| t.view.is_loading())
            .map(|(key, t)| (key.clone(), t.view.clone()))
            .collect()
    }

    /// Subscribes to aggregate changes. The callback hears only changes of
    /// the folded state, not every member transition.
    pub fn listen(&self, callback: impl Fn(AggregateState) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut guard = self.lock();
            let id = guard.next_listener;
            guard.next_listener += 1;
            guard.listeners.insert(id, Arc::new(callback));
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .expect("collection lock")
                    .listeners
                    .shift_remove(&id);
            }
        })
    }
}

impl<K, T> Default for Collection<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for Collection<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock().expect("collection lock");
        f.debug_struct("Collection")
            .field("entries", &guard.entries.len())
            .field("listeners", &guard.listeners.len())
            .finish()
    }
}
