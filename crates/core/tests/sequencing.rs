//! Derived cells, lazy actions, restart semantics, and joined
//! availability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use surety_core::{AsyncOutcome, DomainError, Outcome, OutcomeView};
use tokio::time::sleep;

#[tokio::test]
async fn derived_recomputes_on_each_parent_success() {
    let parent = AsyncOutcome::<u32>::idle();
    let derived = AsyncOutcome::derived(&parent, |n| async move { Ok(n * 10) });
    assert!(derived.is_idle());

    parent.update_value(2);
    assert!(derived.is_loading());
    assert_eq!(derived.settled_result().await.unwrap(), 20);

    parent.update_value(3);
    assert_eq!(derived.settled_result().await.unwrap(), 30);
}

#[tokio::test]
async fn derived_copies_parent_errors_without_running_the_producer() {
    let calls = Arc::new(AtomicU32::new(0));
    let witness = Arc::clone(&calls);
    let parent = AsyncOutcome::<u32>::idle();
    let derived = AsyncOutcome::derived(&parent, move |n| {
        witness.fetch_add(1, Ordering::SeqCst);
        async move { Ok(n) }
    });

    parent.update_error("nope");
    assert_eq!(derived.error().unwrap().code(), "nope");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn derived_follows_the_parent_through_loading() {
    let parent = AsyncOutcome::<u32>::idle();
    let derived = AsyncOutcome::derived(&parent, |n| async move { Ok(n * 10) });

    parent.run_in_place(|_progress| async {
        sleep(Duration::from_millis(10)).await;
        Ok(4)
    });
    assert!(derived.is_loading());
    assert_eq!(derived.settled_result().await.unwrap(), 40);
}

#[tokio::test]
async fn a_detached_derived_cell_stops_following() {
    let parent = AsyncOutcome::<u32>::idle();
    let derived = AsyncOutcome::derived(&parent, |n| async move { Ok(n * 10) });

    parent.update_value(1);
    assert_eq!(derived.settled_result().await.unwrap(), 10);

    derived.detach();
    parent.update_value(5);
    assert_eq!(derived.success_value(), Some(10));
    assert_eq!(parent.listener_count(), 0);
}

#[tokio::test]
async fn lazy_action_stays_idle_until_triggered() {
    let calls = Arc::new(AtomicU32::new(0));
    let witness = Arc::clone(&calls);
    let action = AsyncOutcome::lazy(move |_progress| {
        let calls = Arc::clone(&witness);
        async move { Outcome::ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }
    });
    let result = action.result();
    assert!(result.is_idle());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    action.trigger();
    assert_eq!(result.settled_result().await.unwrap(), 1);
}

#[tokio::test]
async fn lazy_action_retriggers_with_a_fresh_cycle() {
    let calls = Arc::new(AtomicU32::new(0));
    let witness = Arc::clone(&calls);
    let action = AsyncOutcome::lazy(move |_progress| {
        let calls = Arc::clone(&witness);
        async move { Outcome::ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }
    });
    let result = action.result();

    action.trigger();
    assert_eq!(result.settled_result().await.unwrap(), 1);

    action.trigger();
    assert!(result.is_loading());
    assert_eq!(result.settled_result().await.unwrap(), 2);
}

#[tokio::test]
async fn run_in_place_refreshes_a_settled_cell() {
    let cell = AsyncOutcome::run(|_progress| async { Ok(1u32) });
    cell.settled_result().await.unwrap();

    cell.run_in_place(|_progress| async { Ok(2) });
    assert!(cell.is_loading());
    assert_eq!(cell.settled_result().await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn ensure_available_collects_values_in_input_order() {
    let slow = AsyncOutcome::run(|_progress| async {
        sleep(Duration::from_millis(30)).await;
        Ok(1u32)
    });
    let fast = AsyncOutcome::run(|_progress| async {
        sleep(Duration::from_millis(5)).await;
        Ok(2)
    });
    let joined = AsyncOutcome::ensure_available([slow.view(), fast.view()]);
    assert_eq!(joined.settled_result().await.unwrap(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn ensure_available_reports_the_first_error_by_input_order() {
    let first = AsyncOutcome::<u32>::run(|_progress| async {
        sleep(Duration::from_millis(50)).await;
        Err(DomainError::new("first-slot"))
    });
    let second = AsyncOutcome::<u32>::run(|_progress| async {
        sleep(Duration::from_millis(5)).await;
        Err(DomainError::new("second-slot"))
    });
    let joined = AsyncOutcome::ensure_available([first, second]);
    assert_eq!(joined.settled_result().await.unwrap_err().code(), "first-slot");
}

#[tokio::test]
async fn ensure_available_with_no_sources_settles_empty() {
    let joined = AsyncOutcome::<u32>::ensure_available(Vec::<OutcomeView<u32>>::new());
    assert!(joined.is_settled());
    assert_eq!(joined.success_value(), Some(Vec::new()));
}

#[tokio::test]
async fn ensure_available_reverts_to_idle_on_an_idle_source() {
    let ready = AsyncOutcome::ok(1u32);
    let missing = AsyncOutcome::<u32>::idle();
    let joined = AsyncOutcome::ensure_available([ready.view(), missing.view()]);
    assert!(joined.wait_for_settled().await.is_idle());
}
