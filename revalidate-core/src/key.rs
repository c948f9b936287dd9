//! Cache key type and namespacing.
//!
//! Several caches may share one store instance. To keep their entries apart
//! every key is prefixed with the owning cache's name:
//!
//! `{cacheName}#{key}`
//!
//! Caches without a name use the bare key. Neither cache names nor keys may
//! contain the `#` separator. This is a caller contract and is not validated.
//!
//! ```
//! use revalidate_core::CacheKey;
//!
//! let key = CacheKey::namespaced(Some("users"), "42");
//! assert_eq!(key.as_str(), "users#42");
//!
//! let key = CacheKey::namespaced(None, "42");
//! assert_eq!(key.as_str(), "42");
//! ```
//!
//! [`CacheKey`] wraps a [`SmolStr`], so short keys (≤23 bytes) are stored
//! inline and cloning a long key only bumps a reference count.

use smol_str::SmolStr;
use std::fmt;

/// Separator between the cache name and the caller key.
pub const NAMESPACE_SEPARATOR: char = '#';

/// A fully composed key as seen by a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from an already composed string.
    #[inline]
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Composes a key from an optional cache name and a caller key.
    pub fn namespaced(namespace: Option<&str>, key: &str) -> Self {
        match namespace {
            Some(namespace) => Self(smol_str::format_smolstr!(
                "{namespace}{NAMESPACE_SEPARATOR}{key}"
            )),
            None => Self(SmolStr::new(key)),
        }
    }

    /// Returns the composed key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace part, if the key has one.
    pub fn namespace(&self) -> Option<&str> {
        self.0
            .split_once(NAMESPACE_SEPARATOR)
            .map(|(namespace, _)| namespace)
    }

    /// Returns the caller part of the key (everything after the separator).
    pub fn local(&self) -> &str {
        self.0
            .split_once(NAMESPACE_SEPARATOR)
            .map_or(self.as_str(), |(_, local)| local)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CacheKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for CacheKey {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for CacheKey {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
