//! Result cache and request coalescing for the comment pipeline.
//!
//! - [`ResultCache`] keeps annotated comment pages keyed by [`CacheKey`],
//!   bounded by a TTL checked on read and an LRU entry limit.
//! - [`RequestCoalescer`] guarantees at most one upstream load per key at a
//!   time; concurrent callers share its outcome.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 60
//! max_entries = 100
//! ```

mod coalesce;
mod config;
mod keys;
mod lock;
mod store;

pub use coalesce::{Abandoned, RequestCoalescer};
pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{CacheEntry, ResultCache};
