//! Merge a legacy podcast feed and a current podcast feed into one RSS document.
//!
//! The pipeline is linear: download the legacy feed, parse both feeds,
//! merge their episodes (current feed wins on duplicate GUIDs, newest first),
//! then write the merged document built on top of the legacy channel.
//!
//! - [`config`] - TOML configuration carrying every path, URL and canonical text
//! - [`feed`] - XML tree, episode extraction, channel metadata, fetch and write
//! - [`merge`] - pure merge/dedup/sort and output document construction
//! - [`merger`] - the [`FeedMerger`] run orchestrator
//! - [`report`] - progress reporting interface used by the orchestrator

pub mod config;
pub mod feed;
pub mod merge;
pub mod merger;
pub mod report;
pub mod util;

pub use config::{Config, ConfigError};
pub use merger::{FeedMerger, MergeError, MergeSummary};
pub use report::{ConsoleReporter, RecordingReporter, ReportEvent, Reporter};
