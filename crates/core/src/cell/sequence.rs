//! Producer driving: spawned cycles, progress reporting, lazy and derived
//! cells.
//!
//! A producer is any future that yields the cell's terminal state. Drivers
//! spawn it, hold the generation its cycle started under, and settle the
//! cell only if that generation is still current. A panic inside a producer
//! is caught at this boundary and settles the cell with a defect error
//! instead of leaving it loading forever.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::anyhow;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::warn;

use surety_types::{Debounce, DomainError, ListenOptions, Progress};

use crate::cell::listeners::{ListenerCallback, ListenerFate};
use crate::cell::{
    AsyncOutcome, AsyncState, CellShared, OutcomeView, apply_progress, begin_cycle, force_state,
    resolve, set_parent_link,
};
use crate::outcome::Outcome;

fn defect_from_panic(payload: Box<dyn Any + Send>) -> DomainError {
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    };
    warn!(panic = %message, "producer panicked, settling as defect");
    DomainError::defect(anyhow!(message))
}

/// Awaits a future, converting a panic into a defect error.
pub(crate) async fn guard_panics<O>(fut: impl Future<Output = O>) -> Result<O, DomainError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => Err(defect_from_panic(payload)),
    }
}

/// Awaits an outcome-producing future; a panic becomes an error outcome.
pub(crate) async fn drive<T>(fut: impl Future<Output = Outcome<T>>) -> Outcome<T> {
    match guard_panics(fut).await {
        Ok(outcome) => outcome,
        Err(defect) => Outcome::err(defect),
    }
}

/// Starts a cycle on `shared` and spawns `producer` to settle it.
pub(crate) fn spawn_cycle<T, F, Fut>(shared: Arc<CellShared<T>>, producer: F)
where
    T: Clone + Send + 'static,
    F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
{
    let generation = begin_cycle(&shared);
    let progress = ProgressHandle::for_cycle(&shared, generation);
    tokio::spawn(async move {
        let outcome = drive(async move { producer(progress).await }).await;
        resolve(&shared, generation, outcome);
    });
}

/// Progress reporter handed to a producer.
///
/// The handle is scoped to the cycle it was created for: once that cycle is
/// superseded or settled, updates through it are dropped silently, so a
/// slow producer cannot smear progress onto a later run.
#[derive(Clone)]
pub struct ProgressHandle {
    sink: Arc<dyn Fn(Progress) + Send + Sync>,
}

impl ProgressHandle {
    pub(crate) fn for_cycle<T: Clone + Send + 'static>(
        shared: &Arc<CellShared<T>>,
        generation: u64,
    ) -> Self {
        let weak = Arc::downgrade(shared);
        Self {
            sink: Arc::new(move |update| {
                if let Some(shared) = weak.upgrade() {
                    apply_progress(&shared, Some(generation), update);
                }
            }),
        }
    }

    /// Merges a progress update into the owning cell's loading state.
    pub fn update(&self, update: Progress) {
        (self.sink)(update);
    }

    /// Reports only a completion ratio.
    pub fn ratio(&self, ratio: f64) {
        self.update(Progress::ratio(ratio));
    }

    /// Reports only a status line.
    pub fn message(&self, message: impl Into<String>) {
        self.update(Progress::message(message));
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressHandle")
    }
}

type StoredAction<T> = Arc<dyn Fn(ProgressHandle) -> BoxFuture<'static, Outcome<T>> + Send + Sync>;

/// A deferred producer plus the cell its runs settle into.
///
/// The cell stays idle until the first [`LazyAction::trigger`]. Triggering
/// again restarts the cell with a fresh cycle; a run still in flight from
/// an earlier trigger is invalidated and its result discarded.
pub struct LazyAction<T> {
    action: StoredAction<T>,
    result: AsyncOutcome<T>,
}

impl<T: Clone + Send + 'static> LazyAction<T> {
    /// Starts, or restarts, the action.
    pub fn trigger(&self) {
        let action = Arc::clone(&self.action);
        spawn_cycle(Arc::clone(self.result.shared()), move |progress| {
            action(progress)
        });
    }

    /// Read handle on the result cell.
    pub fn result(&self) -> OutcomeView<T> {
        self.result.view()
    }
}

impl<T> fmt::Debug for LazyAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyAction")
            .field("result", &self.result)
            .finish()
    }
}

impl<T: Clone + Send + 'static> AsyncOutcome<T> {
    /// Spawns `producer` and returns a cell tracking it: loading now,
    /// settled with the producer's result when it finishes.
    ///
    /// The producer receives a [`ProgressHandle`] and returns a `Result`,
    /// so its body sequences naturally with `?`:
    ///
    /// ```ignore
    /// let cell = AsyncOutcome::run(|progress| async move {
    ///     let session = open_session().await?;
    ///     progress.ratio(0.5);
    ///     let data = session.fetch().await?;
    ///     Ok(data)
    /// });
    /// ```
    pub fn run<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let cell = Self::idle();
        cell.run_in_place(producer);
        cell
    }

    /// Restarts this cell with a new producer.
    ///
    /// The cell enters loading immediately and adopts the producer's result
    /// when it finishes. A cycle already in flight is invalidated, so its
    /// late result cannot overwrite the new one.
    pub fn run_in_place<F, Fut>(&self, producer: F)
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        spawn_cycle(Arc::clone(self.shared()), move |progress| async move {
            producer(progress).await.into()
        });
    }

    /// Like [`AsyncOutcome::run`] for producers that yield an [`Outcome`]
    /// directly.
    pub fn from_action<F, Fut>(action: F) -> Self
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let cell = Self::idle();
        spawn_cycle(Arc::clone(cell.shared()), action);
        cell
    }

    /// Tracks a future that cannot fail.
    pub fn from_value_future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::from_action(move |_progress| async move { Outcome::ok(fut.await) })
    }

    /// Tracks a fallible future.
    pub fn from_result_future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        Self::from_action(move |_progress| async move { fut.await.into() })
    }

    /// A deferred, retriggerable producer. See [`LazyAction`].
    pub fn lazy<F, Fut>(action: F) -> LazyAction<T>
    where
        F: Fn(ProgressHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        LazyAction {
            action: Arc::new(move |progress| action(progress).boxed()),
            result: Self::idle(),
        }
    }

    /// A cell recomputed from a parent's successes.
    ///
    /// Every success of `parent` starts a fresh run of `producer` with that
    /// value; the parent's idle, loading, and error states are copied over
    /// verbatim. The link lives until this cell is dropped or
    /// [`AsyncOutcome::detach`]ed.
    pub fn derived<P, F, Fut>(parent: &OutcomeView<P>, producer: F) -> Self
    where
        P: Clone + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let cell = Self::idle();
        let weak = Arc::downgrade(cell.shared());
        let producer = Arc::new(producer);
        let callback: ListenerCallback<P> = Arc::new(move |state: &AsyncState<P>| {
            let Some(shared) = weak.upgrade() else {
                return ListenerFate::Discard;
            };
            match state {
                AsyncState::Success(value) => {
                    let producer = Arc::clone(&producer);
                    let value = value.clone();
                    spawn_cycle(shared, move |_progress| async move {
                        producer(value).await.into()
                    });
                }
                AsyncState::Idle => force_state(&shared, AsyncState::Idle),
                AsyncState::Loading { progress } => force_state(
                    &shared,
                    AsyncState::Loading {
                        progress: progress.clone(),
                    },
                ),
                AsyncState::Error(error) => {
                    force_state(&shared, AsyncState::Error(error.clone()));
                }
            }
            ListenerFate::Keep
        });
        let subscription = parent.listen_with_fate(
            callback,
            ListenOptions {
                immediate: true,
                notify_on_progress: true,
                debounce: Debounce::Off,
            },
        );
        set_parent_link(cell.shared(), subscription);
        cell
    }
}
