//! Combinators over cells: chaining, mirroring, debounced views, joins.

use std::sync::Arc;
use std::time::Duration;

use surety_types::{Debounce, ListenOptions};

use crate::cell::listeners::{ListenerCallback, ListenerFate};
use crate::cell::sequence::{drive, guard_panics};
use crate::cell::{
    AsyncOutcome, AsyncState, OutcomeView, begin_cycle, conclude_cycle, force_state, resolve,
    set_parent_link, take_parent_link,
};
use crate::outcome::Outcome;

impl<T: Clone + Send + 'static> OutcomeView<T> {
    /// A new cell fed by this one: once this cell settles successfully,
    /// `step` runs on the value and the new cell adopts its outcome.
    ///
    /// An error in this cell is carried into the new one without running
    /// `step`. If this cell is idle the new cell reverts to idle, since no
    /// input will ever arrive. The new cell is loading from the start, so a
    /// consumer can subscribe before the parent settles.
    pub fn chain<U, F, Fut>(&self, step: F) -> AsyncOutcome<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome<U>> + Send + 'static,
    {
        let result = AsyncOutcome::idle();
        let generation = begin_cycle(result.shared());
        let parent = self.clone();
        let shared = Arc::clone(result.shared());
        tokio::spawn(async move {
            match parent.wait_for_settled().await {
                AsyncState::Success(value) => {
                    let outcome = drive(async move { step(value).await }).await;
                    resolve(&shared, generation, outcome);
                }
                AsyncState::Error(error) => {
                    resolve(&shared, generation, Outcome::err(error));
                }
                _ => {
                    conclude_cycle(&shared, generation, AsyncState::Idle);
                }
            }
        });
        result
    }

    /// Like [`OutcomeView::chain`], but the step returns another cell whose
    /// settlement is awaited in turn.
    pub fn flat_chain<U, F>(&self, step: F) -> AsyncOutcome<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> AsyncOutcome<U> + Send + 'static,
    {
        let result = AsyncOutcome::idle();
        let generation = begin_cycle(result.shared());
        let parent = self.clone();
        let shared = Arc::clone(result.shared());
        tokio::spawn(async move {
            match parent.wait_for_settled().await {
                AsyncState::Success(value) => {
                    let settled = guard_panics(async move {
                        let next = step(value);
                        next.wait_for_settled().await.into_outcome()
                    })
                    .await;
                    match settled {
                        Ok(Some(outcome)) => {
                            resolve(&shared, generation, outcome);
                        }
                        // The inner cell was idle; the gap flows through.
                        Ok(None) => {
                            conclude_cycle(&shared, generation, AsyncState::Idle);
                        }
                        Err(defect) => {
                            resolve(&shared, generation, Outcome::err(defect));
                        }
                    }
                }
                AsyncState::Error(error) => {
                    resolve(&shared, generation, Outcome::err(error));
                }
                _ => {
                    conclude_cycle(&shared, generation, AsyncState::Idle);
                }
            }
        });
        result
    }

    /// A new cell holding `f` of this cell's success value.
    pub fn map<U, F>(&self, f: F) -> AsyncOutcome<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.chain(move |value| async move { Outcome::ok(f(value)) })
    }

    /// A mirror of this cell that delays loading transitions by `delay`.
    ///
    /// Terminal states still arrive immediately and cancel a pending
    /// loading delivery, so an operation that settles faster than `delay`
    /// never shows as loading downstream.
    pub fn to_debounced(&self, delay: Duration) -> AsyncOutcome<T> {
        let result = AsyncOutcome::idle();
        result.attach_mirror(self.clone(), Debounce::Delay(delay), false);
        result
    }
}

impl<T: Clone + Send + 'static> AsyncOutcome<T> {
    /// Makes this cell track `parent`: its current state is copied now and
    /// every later transition, progress included, is copied as it happens.
    ///
    /// Re-mirroring replaces an existing link. The link holds no strong
    /// reference back to this cell, so a forgotten mirror cannot keep it
    /// alive.
    pub fn mirror(&self, parent: impl Into<OutcomeView<T>>) {
        self.attach_mirror(parent.into(), Debounce::Off, false);
    }

    /// Like [`AsyncOutcome::mirror`], but the link tears itself down as
    /// soon as a terminal state has been copied.
    pub fn mirror_until_settled(&self, parent: impl Into<OutcomeView<T>>) {
        self.attach_mirror(parent.into(), Debounce::Off, true);
    }

    /// Severs the link to a mirrored or derived parent. The cell keeps its
    /// current state and goes back to being driven directly.
    pub fn detach(&self) {
        // The subscription touches the parent registry, so it is dropped
        // outside this cell's lock.
        if let Some(link) = take_parent_link(self.shared()) {
            link.unsubscribe();
        }
    }

    fn attach_mirror(&self, parent: OutcomeView<T>, debounce: Debounce, until_settled: bool) {
        self.detach();
        let weak = Arc::downgrade(self.shared());
        let callback: ListenerCallback<T> = Arc::new(move |state: &AsyncState<T>| {
            let Some(shared) = weak.upgrade() else {
                return ListenerFate::Discard;
            };
            force_state(&shared, state.clone());
            if until_settled && state.is_settled() {
                ListenerFate::Discard
            } else {
                ListenerFate::Keep
            }
        });
        let options = ListenOptions {
            immediate: true,
            notify_on_progress: true,
            debounce,
        };
        let subscription = parent.listen_with_fate(callback, options);
        set_parent_link(self.shared(), subscription);
    }

    /// Waits for every source in input order and collects their values.
    ///
    /// The result settles successfully with all values once every source
    /// has, or with the first error encountered in input order. An idle
    /// source reverts the result to idle. No sources at all settle the
    /// result immediately with an empty list.
    pub fn ensure_available<I>(sources: I) -> AsyncOutcome<Vec<T>>
    where
        I: IntoIterator,
        I::Item: Into<OutcomeView<T>>,
    {
        let views: Vec<OutcomeView<T>> = sources.into_iter().map(Into::into).collect();
        if views.is_empty() {
            return AsyncOutcome::ok(Vec::new());
        }
        let result = AsyncOutcome::idle();
        let generation = begin_cycle(result.shared());
        let shared = Arc::clone(result.shared());
        tokio::spawn(async move {
            let mut values = Vec::with_capacity(views.len());
            for view in views {
                match view.wait_for_settled().await {
                    AsyncState::Success(value) => values.push(value),
                    AsyncState::Error(error) => {
                        resolve(&shared, generation, Outcome::err(error));
                        return;
                    }
                    _ => {
                        conclude_cycle(&shared, generation, AsyncState::Idle);
                        return;
                    }
                }
            }
            resolve(&shared, generation, Outcome::ok(values));
        });
        result
    }
}
