//! Offload task policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Policy for handling slow background tasks.
///
/// A refresh whose loader never returns keeps its entry's refresh latch held,
/// which blocks every later refresh of that key. [`TimeoutPolicy::Cancel`]
/// drops such a task after the given duration, releasing the latch.
///
/// Serialized in humantime form:
///
/// ```
/// use revalidate::offload::TimeoutPolicy;
/// use std::time::Duration;
///
/// let policy: TimeoutPolicy = serde_json::from_str(r#"{"cancel": "30s"}"#).unwrap();
/// assert_eq!(policy, TimeoutPolicy::Cancel(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// No timeout - task runs until completion.
    #[default]
    None,
    /// Cancel task after specified duration.
    Cancel(#[serde(with = "humantime_serde")] Duration),
    /// Log warning after duration but let task continue.
    Warn(#[serde(with = "humantime_serde")] Duration),
}
