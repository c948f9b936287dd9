use std::sync::Arc;

use thiserror::Error;

/// Error returned by a loader, shared so one failure can reach every coalesced waiter.
pub type LoaderError = Arc<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations.
///
/// Only the synchronous cold-miss path surfaces errors. Failures of background
/// refreshes are logged and swallowed, leaving the stale value in place.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The loader failed while populating a cold miss.
    #[error("loader failed: {0}")]
    Loader(#[source] LoaderError),
}

impl CacheError {
    /// Wraps any loader error.
    pub fn loader<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CacheError::Loader(Arc::from(error.into()))
    }

    /// Returns the loader error.
    pub fn loader_error(&self) -> &LoaderError {
        match self {
            CacheError::Loader(error) => error,
        }
    }
}
