//! Parameter-keyed caching of async outcomes.
//!
//! A [`KeyedCache`] maps serialized fetch parameters to live
//! `AsyncOutcome` cells. Lookups during a fetch join the in-flight cell,
//! settled entries are served until their TTL or policy says otherwise,
//! and refetches run in place so existing subscribers watch the entry
//! refresh.

pub mod fetcher;
pub mod key;
pub mod store;

pub use fetcher::{Fetcher, fetcher_fn};
pub use key::default_key;
pub use store::KeyedCache;

pub use surety_types::RefetchPolicy;
