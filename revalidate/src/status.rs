use std::fmt;

/// How a lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Entry found and fresh.
    Hit,
    /// Entry found but stale; served while a background refresh revalidates it.
    Stale,
    /// No entry; the value was loaded synchronously.
    Miss,
}

impl CacheStatus {
    /// Returns the status as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Stale => "stale",
            CacheStatus::Miss => "miss",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
