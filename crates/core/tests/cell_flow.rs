//! End-to-end settlement flows: driven producers, chaining, defects, and
//! cycle invalidation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use surety_core::{AsyncOutcome, DEFECT_CODE, DomainError, Outcome};
use tokio::time::sleep;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("surety_core=trace")
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn run_tracks_a_producer_to_success() {
    init_tracing();
    let cell = AsyncOutcome::run(|_progress| async {
        sleep(Duration::from_millis(5)).await;
        Ok(21u32)
    });
    assert!(cell.is_loading());
    assert_eq!(cell.settled_result().await.unwrap(), 21);
}

#[tokio::test]
async fn run_tracks_a_producer_to_error() {
    let cell = AsyncOutcome::<u32>::run(|_progress| async {
        Err(DomainError::new("denied").with_message("no access"))
    });
    let error = cell.settled_result().await.unwrap_err();
    assert_eq!(error.code(), "denied");
    assert_eq!(error.message(), Some("no access"));
}

#[tokio::test(start_paused = true)]
async fn producer_steps_sequence_with_question_mark() {
    let dependency = AsyncOutcome::run(|_progress| async {
        sleep(Duration::from_millis(3)).await;
        Ok(4u32)
    });
    let cell = AsyncOutcome::run(move |_progress| async move {
        let base = dependency.settled_result().await?;
        sleep(Duration::from_millis(3)).await;
        Ok(base * 2)
    });
    assert_eq!(cell.settled_result().await.unwrap(), 8);
}

#[tokio::test]
async fn error_in_an_early_step_skips_the_rest() {
    let reached_second_step = Arc::new(AtomicBool::new(false));
    let witness = Arc::clone(&reached_second_step);
    let cell = AsyncOutcome::<u32>::run(move |_progress| async move {
        let failing = AsyncOutcome::<u32>::err("upstream");
        let value = failing.settled_result().await?;
        witness.store(true, Ordering::SeqCst);
        Ok(value + 1)
    });
    let error = cell.settled_result().await.unwrap_err();
    assert_eq!(error.code(), "upstream");
    assert!(!reached_second_step.load(Ordering::SeqCst));
}

#[tokio::test]
async fn waiting_on_an_idle_cell_returns_immediately() {
    let idle = AsyncOutcome::<u32>::idle();
    assert!(idle.wait_for_settled().await.is_idle());
}

#[tokio::test]
#[should_panic(expected = "unsettled")]
async fn settled_outcome_panics_on_an_idle_cell() {
    AsyncOutcome::<u32>::idle().settled_outcome().await;
}

#[tokio::test(start_paused = true)]
async fn chain_feeds_the_parent_value_into_the_step() {
    let parent = AsyncOutcome::run(|_progress| async {
        sleep(Duration::from_millis(2)).await;
        Ok(3u32)
    });
    let child = parent.chain(|n| async move {
        sleep(Duration::from_millis(2)).await;
        Outcome::ok(n * 7)
    });
    assert!(child.is_loading());
    assert_eq!(child.settled_result().await.unwrap(), 21);
}

#[tokio::test]
async fn chain_carries_the_parent_error_without_running_the_step() {
    let step_ran = Arc::new(AtomicBool::new(false));
    let witness = Arc::clone(&step_ran);
    let parent = AsyncOutcome::<u32>::err_with("offline", "backend unreachable");
    let child = parent.chain(move |n| async move {
        witness.store(true, Ordering::SeqCst);
        Outcome::ok(n)
    });
    let error = child.settled_result().await.unwrap_err();
    assert_eq!(error.code(), "offline");
    assert!(!step_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn chain_on_an_idle_parent_reverts_to_idle() {
    let parent = AsyncOutcome::<u32>::idle();
    let child = parent.chain(|n| async move { Outcome::ok(n) });
    assert!(child.wait_for_settled().await.is_idle());
}

#[tokio::test(start_paused = true)]
async fn flat_chain_awaits_the_inner_cell() {
    let parent = AsyncOutcome::run(|_progress| async { Ok(3u32) });
    let child = parent.flat_chain(|n| {
        AsyncOutcome::run(move |_progress| async move {
            sleep(Duration::from_millis(4)).await;
            Ok(n + 10)
        })
    });
    assert_eq!(child.settled_result().await.unwrap(), 13);
}

#[tokio::test]
async fn flat_chain_propagates_an_inner_idle_gap() {
    let parent = AsyncOutcome::run(|_progress| async { Ok(1u32) });
    let child = parent.flat_chain(|_| AsyncOutcome::<u32>::idle());
    assert!(child.wait_for_settled().await.is_idle());
}

#[tokio::test]
async fn map_transforms_the_success_value() {
    let parent = AsyncOutcome::run(|_progress| async { Ok(5u32) });
    let child = parent.map(|n| format!("got {n}"));
    assert_eq!(child.settled_result().await.unwrap(), "got 5");
}

#[tokio::test(start_paused = true)]
async fn a_restart_discards_the_superseded_cycle() {
    let cell = AsyncOutcome::<&str>::idle();
    cell.run_in_place(|_progress| async {
        sleep(Duration::from_millis(100)).await;
        Ok("slow")
    });
    cell.run_in_place(|_progress| async {
        sleep(Duration::from_millis(10)).await;
        Ok("fast")
    });

    assert_eq!(cell.settled_result().await.unwrap(), "fast");

    // Let the superseded producer finish; its result must land nowhere.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(cell.success_value(), Some("fast"));
}

#[tokio::test(start_paused = true)]
async fn update_value_invalidates_a_cycle_in_flight() {
    let cell = AsyncOutcome::<u32>::idle();
    cell.run_in_place(|_progress| async {
        sleep(Duration::from_millis(50)).await;
        Ok(1)
    });
    cell.update_value(99);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(cell.success_value(), Some(99));
}

#[tokio::test]
async fn a_panicking_producer_settles_as_a_defect() {
    let cell = AsyncOutcome::<u32>::from_action(|_progress| async { panic!("exploded") });
    let error = cell.settled_result().await.unwrap_err();
    assert!(error.is_defect());
    assert_eq!(error.code(), DEFECT_CODE);
    assert_eq!(error.cause().unwrap().to_string(), "exploded");
}

#[tokio::test]
async fn a_panicking_chain_step_settles_as_a_defect() {
    let parent = AsyncOutcome::run(|_progress| async { Ok(2u32) });
    let child: AsyncOutcome<u32> = parent.chain(|_| async { panic!("step blew up") });
    let error = child.settled_result().await.unwrap_err();
    assert!(error.is_defect());
}

#[tokio::test]
async fn from_value_future_settles_successfully() {
    let cell = AsyncOutcome::from_value_future(async { "ready".to_string() });
    assert_eq!(cell.settled_result().await.unwrap(), "ready");
}

#[tokio::test]
async fn from_result_future_settles_with_the_error() {
    let cell = AsyncOutcome::<u32>::from_result_future(async { Err(DomainError::new("nope")) });
    assert_eq!(cell.settled_result().await.unwrap_err().code(), "nope");
}

#[tokio::test]
async fn from_outcome_is_already_settled() {
    let cell = AsyncOutcome::from_outcome(Outcome::ok(12u32));
    assert!(cell.is_settled());
    assert_eq!(cell.success_value(), Some(12));
}
