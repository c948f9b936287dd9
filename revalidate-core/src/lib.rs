#![warn(missing_docs)]
//! # revalidate-core
//!
//! Core traits and types for the revalidate stale-while-revalidate cache.
//!
//! This crate provides the building blocks shared by the cache orchestrator
//! (`revalidate`) and the store implementations (like `revalidate-moka`):
//!
//! - **Address** entries with namespaced keys ([`CacheKey`])
//! - **Hold** computed values with their timestamps ([`CacheEntry`])
//! - **Gate** background recomputation per entry ([`RefreshGuard`])
//! - **Persist** entries with absolute expiry ([`Store`])
//!
//! ## Entry lifecycle
//!
//! An entry is created once per successful computation and is never mutated
//! afterwards. A refresh always produces a brand-new entry that supersedes
//! the previous one in the store. The refresh latch therefore only matters
//! for the entry that is current at decision time: once an entry has been
//! superseded its latch is dead state.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use chrono::Utc;
//! use revalidate_core::{CacheEntry, EntryState};
//!
//! let entry = Arc::new(CacheEntry::new("v1", Utc::now(), Duration::from_secs(10)));
//! assert_eq!(entry.state(Duration::from_secs(2), Utc::now()), EntryState::Fresh);
//!
//! let guard = entry.try_begin_refresh().expect("latch is free");
//! assert!(entry.try_begin_refresh().is_none());
//! drop(guard);
//! assert!(!entry.is_refreshing());
//! ```

pub mod entry;
pub mod key;
pub mod label;
pub mod store;

pub use entry::{CacheEntry, EntryState, RefreshGuard};
pub use key::CacheKey;
pub use label::StoreLabel;
pub use store::Store;
