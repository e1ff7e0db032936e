//! Listener bookkeeping for state cells.
//!
//! The registry itself is plain data guarded by the cell mutex. Delivery
//! planning and callback invocation live in the cell module so that
//! callbacks always run outside the lock.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use surety_types::ListenOptions;

use crate::cell::AsyncState;

/// Identifier handed out per registration, unique within one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

/// What a delivery decided about the listener's registration.
///
/// Internal listeners (mirrors, derived cells, collection tracking) use
/// `Discard` to drop themselves once their job is done. User callbacks
/// registered through the public API always `Keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerFate {
    Keep,
    Discard,
}

pub(crate) type ListenerCallback<T> = Arc<dyn Fn(&AsyncState<T>) -> ListenerFate + Send + Sync>;

pub(crate) struct ListenerEntry<T> {
    pub(crate) callback: ListenerCallback<T>,
    pub(crate) options: ListenOptions,
    /// Generation of the loading cycle whose delivery is parked on a
    /// debounce timer. Cleared when the timer fires or the cycle ends.
    pub(crate) pending_delay: Option<u64>,
}

/// Ordered listener set. Iteration follows registration order.
pub(crate) struct ListenerRegistry<T> {
    entries: IndexMap<ListenerId, ListenerEntry<T>>,
    next_id: u64,
}

impl<T> ListenerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn insert(
        &mut self,
        callback: ListenerCallback<T>,
        options: ListenOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            ListenerEntry {
                callback,
                options,
                pending_delay: None,
            },
        );
        id
    }

    /// Removes a listener, preserving the order of the remaining entries.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ListenerId) -> Option<&mut ListenerEntry<T>> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ListenerId, &ListenerEntry<T>)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ListenerId, &mut ListenerEntry<T>)> {
        self.entries.iter_mut().map(|(id, entry)| (*id, entry))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle for a registered listener.
///
/// Dropping the handle does not unregister the listener; call
/// [`Subscription::unsubscribe`] to stop deliveries. Unsubscribing during a
/// notification pass is safe, and a listener removed mid-pass is skipped for
/// the remainder of that pass.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stops deliveries to the associated listener. Idempotent in effect:
    /// unsubscribing a listener that is already gone does nothing.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
