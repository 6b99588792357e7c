use crate::state::ScrapeStatus;
use serde::{Deserialize, Serialize};

/// Position inside the listing walk, stored as JSON in the progress row
///
/// `page` is the listing page being processed and `item_offset` the index of
/// the next item on that page still to be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCursor {
    pub page: u32,
    pub item_offset: u32,
}

impl ResumeCursor {
    pub fn start() -> Self {
        Self {
            page: 1,
            item_offset: 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a stored cursor; a malformed value yields None
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

impl Default for ResumeCursor {
    fn default() -> Self {
        Self::start()
    }
}

/// Everything a new run needs to continue where the last one stopped
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub cursor: ResumeCursor,
    pub processed_items: u64,
    pub total_items: u64,
    pub total_pages: u32,
    pub status: ScrapeStatus,
    pub config_hash: Option<String>,
}

impl ResumePoint {
    /// Starting point for a task with no stored progress
    pub fn fresh() -> Self {
        Self {
            cursor: ResumeCursor::start(),
            processed_items: 0,
            total_items: 0,
            total_pages: 0,
            status: ScrapeStatus::Pending,
            config_hash: None,
        }
    }

    /// Returns true if this point continues an interrupted walk
    pub fn is_continuation(&self) -> bool {
        self.status.is_resumable()
    }
}
