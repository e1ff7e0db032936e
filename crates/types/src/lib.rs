//! Shared plain data types for the surety crates: error values, progress
//! payloads, cache policies, and listener options. Behavior-rich types
//! (`Outcome`, `AsyncOutcome`, `KeyedCache`) live in `surety-core` and
//! `surety-cache`; this crate stays dependency-light so every layer can
//! agree on the vocabulary.

pub mod error;
pub mod listen;
pub mod policy;
pub mod progress;

pub use error::{DEFECT_CODE, DomainError, UnwrapError};
pub use listen::{Debounce, ListenOptions};
pub use policy::{AggregateState, RefetchPolicy};
pub use progress::Progress;
