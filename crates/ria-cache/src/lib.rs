//! RIA Cache
//!
//! Content-addressed cache of extracted document text.
//!
//! # Architecture
//!
//! ```text
//! bytes → ContentDigest → CacheStore::exists ─ hit ─→ CacheStore::get
//!                               │
//!                              miss → extraction → CacheStore::put
//! ```
//!
//! The store contract is deliberately small (`exists` / `get` / `put`) so a
//! remote key-value table can sit behind it. [`FlightGroup`] lets the caller
//! collapse concurrent misses on the same digest into one extraction.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod flight;
pub mod fs;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use flight::{Flight, FlightGroup};
pub use fs::FsCacheStore;
pub use store::{CacheStats, CacheStore, MemoryCacheStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
