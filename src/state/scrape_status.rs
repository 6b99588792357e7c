//! Lifecycle of a scrape task
//!
//! One status is stored per task (site) in the progress table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents where a scrape task is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    /// Task has never been started
    Pending,

    /// A worker is walking the listing, or one crashed while doing so
    Running,

    /// Stopped cooperatively; resumable from the stored cursor
    Paused,

    /// Every listing page was consumed
    Completed,

    /// Stopped by a fatal error; resumable from the stored cursor
    Failed,
}

impl ScrapeStatus {
    /// Returns true if a new start should continue from the stored cursor
    ///
    /// A `Running` row with no live worker means the previous process died
    /// mid-run, so it resumes like a paused task.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Paused | Self::Failed | Self::Running)
    }

    /// Checks the lifecycle rules
    ///
    /// Every status may move to `Running` (a new start); only `Running` may
    /// move to the three outcomes.
    pub fn can_transition_to(&self, next: ScrapeStatus) -> bool {
        match next {
            Self::Running => true,
            Self::Completed | Self::Failed | Self::Paused => *self == Self::Running,
            Self::Pending => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Running,
            Self::Paused,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
