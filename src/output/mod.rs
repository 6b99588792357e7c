//! Output module for reporting catalog and job statistics
//!
//! This module handles:
//! - Aggregating catalog counts and task progress from storage
//! - Measuring the blob tree
//! - Printing a summary for the `--stats` CLI mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics, TaskStatistics};
