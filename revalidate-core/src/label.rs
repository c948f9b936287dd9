//! Names of store instances, as they appear in logs and metrics.

use smol_str::SmolStr;
use std::fmt;

/// Name used for caches created without one.
pub const UNNAMED_CACHE: &str = "default";

/// A label identifying a [`Store`](crate::Store) instance.
///
/// A store shared between several caches is usually labelled explicitly. A
/// store owned by a single cache takes the cache's name, see
/// [`StoreLabel::for_cache`].
///
/// ```
/// use revalidate_core::StoreLabel;
///
/// assert_eq!(StoreLabel::for_cache(Some("users")).as_str(), "users");
/// assert_eq!(StoreLabel::for_cache(None).as_str(), "default");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreLabel(SmolStr);

impl StoreLabel {
    /// Creates a label from a static string without allocating.
    pub const fn new_static(label: &'static str) -> Self {
        Self(SmolStr::new_static(label))
    }

    /// Label for the store owned by the cache called `name`.
    pub fn for_cache(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self(SmolStr::new(name)),
            None => Self::new_static(UNNAMED_CACHE),
        }
    }

    /// Returns the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreLabel {
    fn from(label: &str) -> Self {
        Self(SmolStr::new(label))
    }
}

impl From<String> for StoreLabel {
    fn from(label: String) -> Self {
        Self(label.into())
    }
}
