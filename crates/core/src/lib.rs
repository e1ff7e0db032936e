//! Asynchronous result state machine.
//!
//! The crate is built around three layers:
//!
//! - [`Outcome`]: a settled result, success or domain error.
//! - [`AsyncOutcome`] / [`OutcomeView`]: a four-state cell (idle, loading,
//!   success, error) with synchronous listeners, awaitable settlement,
//!   chaining, mirroring, and driven producer cycles.
//! - [`Collection`]: keyed tracking of many cells folded into a single
//!   any-loading / all-settled aggregate.
//!
//! Producers report progress through [`ProgressHandle`] and panics inside
//! them settle the owning cell with a defect error rather than poisoning
//! it. See `surety-cache` for the parameter-keyed cache built on top.

pub mod cell;
pub mod collection;
pub mod outcome;

pub use cell::{
    AsyncOutcome, AsyncState, LazyAction, OutcomeView, ProgressHandle, Subscription,
};
pub use collection::Collection;
pub use outcome::Outcome;

pub use surety_types::{
    AggregateState, DEFECT_CODE, Debounce, DomainError, ListenOptions, Progress, UnwrapError,
};
