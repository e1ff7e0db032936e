//! Four-state result cells.
//!
//! An [`AsyncOutcome`] starts idle, enters loading when a producer begins
//! work, and settles into success or error. Every transition is broadcast
//! synchronously to registered listeners in registration order, and settled
//! states can be awaited through [`OutcomeView::wait_for_settled`].
//!
//! The owner/view split mirrors a single-producer channel: [`AsyncOutcome`]
//! carries the mutators, [`OutcomeView`] is the shareable read-and-subscribe
//! handle every consumer gets.

mod compose;
mod listeners;
mod sequence;

pub use listeners::Subscription;
pub use sequence::{LazyAction, ProgressHandle};

pub(crate) use listeners::{ListenerCallback, ListenerFate};

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace};

use surety_types::{Debounce, DomainError, ListenOptions, Progress};

use crate::cell::listeners::{ListenerId, ListenerRegistry};
use crate::outcome::Outcome;

/// The four states a cell moves through.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncState<T> {
    /// No work has been requested yet.
    Idle,
    /// A producer is running. Progress is optional and merged field-wise
    /// as updates arrive.
    Loading { progress: Option<Progress> },
    /// The producer finished with a value.
    Success(T),
    /// The producer finished with an error.
    Error(DomainError),
}

impl<T> AsyncState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// True for success and error. Idle is not settled: it is the absence
    /// of a request, not a finished one.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }

    /// Progress attached to a loading state, if any was reported.
    pub fn progress(&self) -> Option<&Progress> {
        match self {
            Self::Loading { progress } => progress.as_ref(),
            _ => None,
        }
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Converts a settled state into an [`Outcome`]; `None` for idle and
    /// loading.
    pub fn into_outcome(self) -> Option<Outcome<T>> {
        match self {
            Self::Success(value) => Some(Outcome::ok(value)),
            Self::Error(error) => Some(Outcome::err(error)),
            Self::Idle | Self::Loading { .. } => None,
        }
    }

    /// Short tag for logs and `Debug` output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading { .. } => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

pub(crate) struct CellInner<T> {
    pub(crate) state: AsyncState<T>,
    /// Bumped on every loading entry and every forced transition. A driver
    /// resolves only if the generation it started still matches, so a
    /// superseded cycle lands nowhere.
    pub(crate) generation: u64,
    pub(crate) listeners: ListenerRegistry<T>,
    /// Subscription held on a parent cell while mirroring or deriving.
    pub(crate) parent_link: Option<Subscription>,
}

pub(crate) struct CellShared<T> {
    pub(crate) inner: Mutex<CellInner<T>>,
    /// Woken whenever the cell leaves the loading state.
    settled: Notify,
}

impl<T> CellShared<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, CellInner<T>> {
        self.inner.lock().expect("cell lock")
    }
}

/// Which listeners a transition reaches.
enum NotifyKind {
    /// Loading entry: subject to per-listener debounce.
    Loading { generation: u64 },
    /// Progress merge while loading: only listeners that opted in, and only
    /// when no debounce is holding their loading delivery back.
    ProgressOnly,
    /// Terminal states and idle copies: everyone, and any parked debounce
    /// delivery is cancelled.
    Always,
}

enum PlanStep<T> {
    Deliver {
        id: ListenerId,
        callback: ListenerCallback<T>,
    },
    Schedule {
        id: ListenerId,
        generation: u64,
        delay: Duration,
    },
}

/// Decides deliveries under the lock; callbacks run later, outside it.
fn plan_dispatch<T>(inner: &mut CellInner<T>, kind: NotifyKind) -> Vec<PlanStep<T>> {
    let mut plan = Vec::with_capacity(inner.listeners.len());
    match kind {
        NotifyKind::Always => {
            for (id, entry) in inner.listeners.iter_mut() {
                entry.pending_delay = None;
                plan.push(PlanStep::Deliver {
                    id,
                    callback: entry.callback.clone(),
                });
            }
        }
        NotifyKind::Loading { generation } => {
            for (id, entry) in inner.listeners.iter_mut() {
                match entry.options.debounce {
                    Debounce::Off => plan.push(PlanStep::Deliver {
                        id,
                        callback: entry.callback.clone(),
                    }),
                    Debounce::Delay(delay) => {
                        entry.pending_delay = Some(generation);
                        plan.push(PlanStep::Schedule {
                            id,
                            generation,
                            delay,
                        });
                    }
                    Debounce::SkipLoading => {}
                }
            }
        }
        NotifyKind::ProgressOnly => {
            for (id, entry) in inner.listeners.iter() {
                let held_back = entry.pending_delay.is_some()
                    || matches!(entry.options.debounce, Debounce::SkipLoading);
                if entry.options.notify_on_progress && !held_back {
                    plan.push(PlanStep::Deliver {
                        id,
                        callback: entry.callback.clone(),
                    });
                }
            }
        }
    }
    plan
}

/// Runs a dispatch plan. Each callback is re-checked against the registry
/// first, so a listener unsubscribed earlier in the pass is skipped.
fn run_plan<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    plan: Vec<PlanStep<T>>,
    snapshot: &AsyncState<T>,
) {
    for step in plan {
        match step {
            PlanStep::Deliver { id, callback } => {
                if !shared.lock().listeners.contains(id) {
                    continue;
                }
                if callback(snapshot) == ListenerFate::Discard {
                    shared.lock().listeners.remove(id);
                }
            }
            PlanStep::Schedule {
                id,
                generation,
                delay,
            } => schedule_delayed(shared, id, generation, delay),
        }
    }
}

/// Parks one listener's loading delivery on a timer. At fire time the
/// delivery happens only if the listener is still registered, the cell is
/// still loading, and the cycle is still the same one.
fn schedule_delayed<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    id: ListenerId,
    generation: u64,
    delay: Duration,
) {
    let weak = Arc::downgrade(shared);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let fire = {
            let mut inner = shared.lock();
            let current = inner.generation;
            let loading = inner.state.is_loading();
            let snapshot = inner.state.clone();
            match inner.listeners.get_mut(id) {
                Some(entry) if entry.pending_delay == Some(generation) => {
                    entry.pending_delay = None;
                    (current == generation && loading)
                        .then(|| (entry.callback.clone(), snapshot))
                }
                _ => None,
            }
        };
        if let Some((callback, snapshot)) = fire
            && callback(&snapshot) == ListenerFate::Discard
        {
            shared.lock().listeners.remove(id);
        }
    });
}

/// Starts a new loading cycle and returns its generation.
pub(crate) fn begin_cycle<T: Clone + Send + 'static>(shared: &Arc<CellShared<T>>) -> u64 {
    let (generation, plan, snapshot) = {
        let mut inner = shared.lock();
        inner.generation += 1;
        inner.state = AsyncState::Loading { progress: None };
        let generation = inner.generation;
        let plan = plan_dispatch(&mut inner, NotifyKind::Loading { generation });
        (generation, plan, inner.state.clone())
    };
    trace!(generation, "loading cycle started");
    run_plan(shared, plan, &snapshot);
    generation
}

/// Ends the cycle identified by `generation` with a non-loading state.
/// Returns false when the cycle was superseded and the state was discarded.
pub(crate) fn conclude_cycle<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    generation: u64,
    state: AsyncState<T>,
) -> bool {
    let (plan, snapshot) = {
        let mut inner = shared.lock();
        if inner.generation != generation {
            debug!(
                stale = generation,
                current = inner.generation,
                "discarding superseded cycle resolution"
            );
            return false;
        }
        inner.state = state;
        let plan = plan_dispatch(&mut inner, NotifyKind::Always);
        (plan, inner.state.clone())
    };
    run_plan(shared, plan, &snapshot);
    shared.settled.notify_waiters();
    true
}

/// Settles the cycle identified by `generation` with an outcome.
pub(crate) fn resolve<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    generation: u64,
    outcome: Outcome<T>,
) -> bool {
    let state = match outcome.into_result() {
        Ok(value) => AsyncState::Success(value),
        Err(error) => AsyncState::Error(error),
    };
    conclude_cycle(shared, generation, state)
}

/// Writes a state unconditionally. The generation is bumped (except for
/// loading-to-loading rewrites, which count as progress), so any in-flight
/// cycle is invalidated and cannot clobber the forced state later.
pub(crate) fn force_state<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    state: AsyncState<T>,
) {
    let (plan, snapshot, wake) = {
        let mut inner = shared.lock();
        let progress_only = inner.state.is_loading() && state.is_loading();
        if !progress_only {
            inner.generation += 1;
        }
        let generation = inner.generation;
        inner.state = state;
        let kind = if progress_only {
            NotifyKind::ProgressOnly
        } else if inner.state.is_loading() {
            NotifyKind::Loading { generation }
        } else {
            NotifyKind::Always
        };
        let wake = !inner.state.is_loading();
        let plan = plan_dispatch(&mut inner, kind);
        (plan, inner.state.clone(), wake)
    };
    run_plan(shared, plan, &snapshot);
    if wake {
        shared.settled.notify_waiters();
    }
}

/// Merges a progress update into the current loading state. Ignored when
/// the cell is not loading, or when `generation` no longer matches.
pub(crate) fn apply_progress<T: Clone + Send + 'static>(
    shared: &Arc<CellShared<T>>,
    generation: Option<u64>,
    update: Progress,
) {
    let dispatch = {
        let mut inner = shared.lock();
        let current = generation.is_none_or(|g| g == inner.generation);
        match &mut inner.state {
            AsyncState::Loading { progress } if current => {
                progress.get_or_insert_with(Progress::default).merge(update);
                let plan = plan_dispatch(&mut inner, NotifyKind::ProgressOnly);
                Some((plan, inner.state.clone()))
            }
            _ => None,
        }
    };
    if let Some((plan, snapshot)) = dispatch {
        run_plan(shared, plan, &snapshot);
    }
}

pub(crate) fn take_parent_link<T>(shared: &CellShared<T>) -> Option<Subscription> {
    shared.lock().parent_link.take()
}

pub(crate) fn set_parent_link<T>(shared: &CellShared<T>, subscription: Subscription) {
    shared.lock().parent_link = Some(subscription);
}

/// Shareable read-and-subscribe handle on a cell.
///
/// Views are cheap to clone and never expose mutation; components that hand
/// out cells (a cache, a collection) hand out views so callers can observe
/// and await but not interfere.
pub struct OutcomeView<T> {
    pub(crate) shared: Arc<CellShared<T>>,
}

impl<T> Clone for OutcomeView<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> OutcomeView<T> {
    /// Snapshot of the current state.
    pub fn state(&self) -> AsyncState<T> {
        self.shared.lock().state.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().state.is_idle()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().state.is_loading()
    }

    pub fn is_success(&self) -> bool {
        self.shared.lock().state.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.shared.lock().state.is_error()
    }

    pub fn is_settled(&self) -> bool {
        self.shared.lock().state.is_settled()
    }

    /// Current progress report, when loading and one was given.
    pub fn progress(&self) -> Option<Progress> {
        self.shared.lock().state.progress().cloned()
    }

    /// The success value, when settled successfully.
    pub fn success_value(&self) -> Option<T> {
        self.shared.lock().state.success().cloned()
    }

    /// The error, when settled with one.
    pub fn error(&self) -> Option<DomainError> {
        self.shared.lock().state.error().cloned()
    }

    /// True when both handles point at the same underlying cell.
    pub fn same_cell(&self, other: &OutcomeView<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    /// Registers a listener for state transitions.
    ///
    /// Callbacks run synchronously within the operation that triggered the
    /// transition, in registration order, and the cell lock is never held
    /// across a callback: a callback may freely read the cell, register
    /// more listeners, or unsubscribe others.
    pub fn listen(
        &self,
        callback: impl Fn(&AsyncState<T>) + Send + Sync + 'static,
        options: ListenOptions,
    ) -> Subscription {
        self.listen_with_fate(
            Arc::new(move |state| {
                callback(state);
                ListenerFate::Keep
            }),
            options,
        )
    }

    pub(crate) fn listen_with_fate(
        &self,
        callback: ListenerCallback<T>,
        options: ListenOptions,
    ) -> Subscription {
        let replay = options.immediate;
        let (id, snapshot) = {
            let mut inner = self.shared.lock();
            let id = inner.listeners.insert(callback.clone(), options);
            let snapshot = replay.then(|| inner.state.clone());
            (id, snapshot)
        };
        // Immediate replay happens outside the lock and bypasses debounce.
        if let Some(snapshot) = snapshot
            && callback(&snapshot) == ListenerFate::Discard
        {
            self.shared.lock().listeners.remove(id);
        }
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.lock().listeners.remove(id);
            }
        })
    }

    /// Waits until the cell is not loading and returns that state.
    ///
    /// Success and error are returned once reached; an idle cell is
    /// returned as-is without waiting, since no producer is running and
    /// nothing would ever wake the waiter.
    pub async fn wait_for_settled(&self) -> AsyncState<T> {
        loop {
            let notified = self.shared.settled.notified();
            {
                let inner = self.shared.lock();
                if !inner.state.is_loading() {
                    return inner.state.clone();
                }
            }
            notified.await;
        }
    }

    /// Waits for settlement and returns the terminal state as an
    /// [`Outcome`].
    ///
    /// # Panics
    ///
    /// Panics if the cell is idle: an idle cell has no producer and can
    /// never settle, so awaiting an outcome from it is a caller bug. Use
    /// [`OutcomeView::wait_for_settled`] when idle is an expected answer.
    pub async fn settled_outcome(&self) -> Outcome<T> {
        match self.wait_for_settled().await {
            AsyncState::Success(value) => Outcome::ok(value),
            AsyncState::Error(error) => Outcome::err(error),
            state => panic!("called `settled_outcome` on an unsettled ({}) cell", state.label()),
        }
    }

    /// Waits for settlement and returns the terminal state as a `Result`,
    /// ready for `?`.
    ///
    /// # Panics
    ///
    /// Panics on an idle cell, like [`OutcomeView::settled_outcome`].
    pub async fn settled_result(&self) -> Result<T, DomainError> {
        self.settled_outcome().await.into_result()
    }
}

impl<T> fmt::Debug for OutcomeView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeView")
            .field("state", &self.shared.lock().state.label())
            .finish()
    }
}

/// Owning handle on a cell: everything a view can do, plus mutation.
///
/// Cloning an `AsyncOutcome` clones the handle, not the cell; both clones
/// drive the same state.
pub struct AsyncOutcome<T> {
    view: OutcomeView<T>,
}

impl<T> Clone for AsyncOutcome<T> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
        }
    }
}

impl<T> Deref for AsyncOutcome<T> {
    type Target = OutcomeView<T>;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

impl<T: Clone + Send + 'static> Default for AsyncOutcome<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T: Clone + Send + 'static> AsyncOutcome<T> {
    fn with_state(state: AsyncState<T>) -> Self {
        Self {
            view: OutcomeView {
                shared: Arc::new(CellShared {
                    inner: Mutex::new(CellInner {
                        state,
                        generation: 0,
                        listeners: ListenerRegistry::new(),
                        parent_link: None,
                    }),
                    settled: Notify::new(),
                }),
            },
        }
    }

    /// A cell with no producer attached yet.
    pub fn idle() -> Self {
        Self::with_state(AsyncState::Idle)
    }

    /// A cell already settled with `value`.
    pub fn ok(value: T) -> Self {
        Self::with_state(AsyncState::Success(value))
    }

    /// A cell already settled with `error`.
    pub fn err(error: impl Into<DomainError>) -> Self {
        Self::with_state(AsyncState::Error(error.into()))
    }

    /// A cell already settled with an error built from code and message.
    pub fn err_with(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_state(AsyncState::Error(DomainError::new(code).with_message(message)))
    }

    /// A cell already settled from a synchronous [`Outcome`].
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        match outcome.into_result() {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }

    /// A read-only handle on this cell.
    pub fn view(&self) -> OutcomeView<T> {
        self.view.clone()
    }

    pub(crate) fn shared(&self) -> &Arc<CellShared<T>> {
        &self.view.shared
    }

    /// Forces the cell to a success state.
    ///
    /// Listeners are notified before this returns. A cycle in flight is
    /// invalidated: its later resolution is discarded rather than allowed
    /// to overwrite the forced value.
    pub fn update_value(&self, value: T) {
        force_state(self.shared(), AsyncState::Success(value));
    }

    /// Forces the cell to an error state. Same invalidation rules as
    /// [`AsyncOutcome::update_value`].
    pub fn update_error(&self, error: impl Into<DomainError>) {
        force_state(self.shared(), AsyncState::Error(error.into()));
    }

    /// Merges a progress update into the current loading state and notifies
    /// listeners that opted into progress. Ignored unless the cell is
    /// loading.
    pub fn update_progress(&self, update: Progress) {
        apply_progress(self.shared(), None, update);
    }
}

impl<T: Clone + Send + 'static> From<Outcome<T>> for AsyncOutcome<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self::from_outcome(outcome)
    }
}

impl<T> From<AsyncOutcome<T>> for OutcomeView<T> {
    fn from(cell: AsyncOutcome<T>) -> Self {
        cell.view
    }
}

impl<T> From<&AsyncOutcome<T>> for OutcomeView<T> {
    fn from(cell: &AsyncOutcome<T>) -> Self {
        cell.view.clone()
    }
}

impl<T> From<&OutcomeView<T>> for OutcomeView<T> {
    fn from(view: &OutcomeView<T>) -> Self {
        view.clone()
    }
}

impl<T> fmt::Debug for AsyncOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOutcome")
            .field("state", &self.view.shared.lock().state.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn record_states<T: Clone + Send + 'static>(
        view: &OutcomeView<T>,
        log: &Arc<StdMutex<Vec<String>>>,
        options: ListenOptions,
    ) -> Subscription {
        let log = Arc::clone(log);
        view.listen(
            move |state| log.lock().unwrap().push(state.label().to_string()),
            options,
        )
    }

    #[test]
    fn constructors_set_expected_states() {
        assert!(AsyncOutcome::<u32>::idle().is_idle());
        assert_eq!(AsyncOutcome::ok(7).success_value(), Some(7));
        let failed = AsyncOutcome::<u32>::err_with("io", "disk gone");
        assert_eq!(failed.error().unwrap().code(), "io");
    }

    #[test]
    fn update_value_notifies_synchronously() {
        let cell = AsyncOutcome::<u32>::idle();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let _sub = record_states(&cell.view(), &log, ListenOptions::default());

        cell.update_value(3);
        assert_eq!(log.lock().unwrap().as_slice(), ["success"]);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let cell = AsyncOutcome::<u32>::idle();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                cell.listen(
                    move |_| order.lock().unwrap().push(i),
                    ListenOptions::default(),
                )
            })
            .collect();

        cell.update_value(1);
        assert_eq!(order.lock().unwrap().as_slice(), [0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn immediate_replays_current_state_once() {
        let cell = AsyncOutcome::ok(9);
        let log = Arc::new(StdMutex::new(Vec::new()));
        let _sub = record_states(&cell.view(), &log, ListenOptions::immediate());
        assert_eq!(log.lock().unwrap().as_slice(), ["success"]);
    }

    #[test]
    fn unsubscribe_stops_deliveries() {
        let cell = AsyncOutcome::<u32>::idle();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sub = record_states(&cell.view(), &log, ListenOptions::default());

        cell.update_value(1);
        sub.unsubscribe();
        cell.update_value(2);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(cell.listener_count(), 0);
    }

    #[test]
    fn listener_removed_mid_pass_is_skipped() {
        let cell = AsyncOutcome::<u32>::idle();
        let second_sub: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let second_fired = Arc::new(StdMutex::new(false));

        // First listener tears down the second during the same pass.
        let slot = Arc::clone(&second_sub);
        let _first = cell.listen(
            move |_| {
                if let Some(sub) = slot.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            },
            ListenOptions::default(),
        );
        let fired = Arc::clone(&second_fired);
        let sub = cell.listen(
            move |_| *fired.lock().unwrap() = true,
            ListenOptions::default(),
        );
        *second_sub.lock().unwrap() = Some(sub);

        cell.update_value(5);
        assert!(!*second_fired.lock().unwrap());
    }

    #[test]
    fn progress_updates_reach_only_opted_in_listeners() {
        let cell = AsyncOutcome::<u32>::idle();
        let plain = Arc::new(StdMutex::new(Vec::new()));
        let progress = Arc::new(StdMutex::new(Vec::new()));
        let _a = record_states(&cell.view(), &plain, ListenOptions::default());
        let _b = record_states(&cell.view(), &progress, ListenOptions::default().with_progress());

        begin_cycle(cell.shared());
        cell.update_progress(Progress::ratio(0.5));
        cell.update_progress(Progress::message("halfway"));

        // Both saw the loading entry; only the opted-in one saw the merges.
        assert_eq!(plain.lock().unwrap().as_slice(), ["loading"]);
        assert_eq!(
            progress.lock().unwrap().as_slice(),
            ["loading", "loading", "loading"]
        );
        assert_eq!(cell.progress().unwrap().message.as_deref(), Some("halfway"));
    }

    #[test]
    fn progress_is_ignored_outside_loading() {
        let cell = AsyncOutcome::ok(1);
        cell.update_progress(Progress::ratio(0.9));
        assert!(cell.progress().is_none());
        assert_eq!(cell.success_value(), Some(1));
    }

    #[test]
    fn stale_resolution_is_discarded() {
        let cell = AsyncOutcome::<u32>::idle();
        let generation = begin_cycle(cell.shared());

        cell.update_value(42);
        assert!(!resolve(cell.shared(), generation, Outcome::ok(7)));
        assert_eq!(cell.success_value(), Some(42));
    }

    #[test]
    fn resolve_settles_the_matching_cycle() {
        let cell = AsyncOutcome::<u32>::idle();
        let generation = begin_cycle(cell.shared());
        assert!(cell.is_loading());
        assert!(resolve(cell.shared(), generation, Outcome::ok(11)));
        assert_eq!(cell.success_value(), Some(11));
    }

    #[test]
    fn callbacks_run_outside_the_lock() {
        // A listener reading the cell back would deadlock if dispatch held
        // the lock across callbacks.
        let cell = AsyncOutcome::<u32>::idle();
        let seen = Arc::new(StdMutex::new(None));
        let probe = cell.view();
        let seen_in = Arc::clone(&seen);
        let _sub = cell.listen(
            move |_| *seen_in.lock().unwrap() = probe.success_value(),
            ListenOptions::default(),
        );

        cell.update_value(13);
        assert_eq!(*seen.lock().unwrap(), Some(13));
    }
}
