//! State module for tracking scrape progress
//!
//! # Components
//!
//! - `ScrapeStatus`: Lifecycle of a scrape task (pending, running, paused, completed, failed)
//! - `ResumeCursor` / `ResumePoint`: Where an interrupted walk continues
//! - `ProgressTracker`: Writes checkpoints and job log entries for a running task

mod resume;
mod scrape_status;
mod tracker;

// Re-export main types
pub use resume::{ResumeCursor, ResumePoint};
pub use scrape_status::ScrapeStatus;
pub use tracker::{load_resume_point, Checkpoint, ProgressTracker};
