//! Offload manager for background task execution.
//!
//! Stale hits hand their refresh to the [`OffloadManager`], which runs it as a
//! detached tokio task. No caller awaits these tasks, but the manager counts
//! them so they can be awaited on shutdown or cancelled, and bounds each one
//! by a [`TimeoutPolicy`].
//!
//! # Example
//!
//! ```
//! use revalidate::offload::{OffloadManager, TimeoutPolicy};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = OffloadManager::new(TimeoutPolicy::Cancel(Duration::from_secs(30)));
//!
//! manager.spawn("refresh", async {
//!     // Revalidation logic here
//! });
//! manager.wait_all().await;
//! assert_eq!(manager.active_task_count(), 0);
//! # }
//! ```

mod manager;
mod policy;

pub use manager::{OffloadManager, TaskOutcome};
pub use policy::TimeoutPolicy;
