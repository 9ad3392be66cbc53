//! Cart synchronization status.

use serde::{Deserialize, Serialize};

/// Where the most recent store round trip stands.
///
/// Each mutating call moves `Idle`/`Applied`/`Failed` → `InFlight` → `Applied`
/// or `Failed`. Views use `InFlight` to disable quantity controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing has been sent to the store yet.
    #[default]
    Idle,
    /// A write or its confirming re-read is outstanding.
    InFlight,
    /// The last round trip succeeded and local state matches the store.
    Applied,
    /// The last round trip failed; local state is the last known good one.
    Failed,
}

impl SyncStatus {
    /// Whether a request is outstanding.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::InFlight)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InFlight => write!(f, "in_flight"),
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
