//! Progress reporting for a merge run.
//!
//! The orchestrator emits [`ReportEvent`]s through a [`Reporter`]; it never
//! prints. [`ConsoleReporter`] renders them for a terminal, and
//! [`RecordingReporter`] keeps them for inspection in tests.

use std::fmt;

use crate::feed::{FeedSource, MetadataNotice};
use crate::merger::MergeSummary;
use crate::util::episode_label;

/// Display width of episode titles in console listings.
const TITLE_WIDTH: usize = 70;

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    ParseLegacy,
    ParseCurrent,
    Merge,
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Fetch => "Downloading legacy feed",
            Phase::ParseLegacy => "Reading legacy feed",
            Phase::ParseCurrent => "Reading current feed",
            Phase::Merge => "Merging feeds",
            Phase::Write => "Writing merged feed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    PhaseStarted(Phase),
    PhaseFinished { phase: Phase, detail: String },
    PhaseFailed { phase: Phase, error: String },
    Metadata(MetadataNotice),
    /// One line of the merged episode listing, 1-based.
    EpisodeListed {
        position: usize,
        source: FeedSource,
        title: Option<String>,
    },
    Warning(String),
    Finished(MergeSummary),
}

pub trait Reporter {
    fn report(&mut self, event: ReportEvent);
}

/// Prints events as human-readable lines; failures go to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::PhaseStarted(phase) => println!("\n==> {phase}..."),
            ReportEvent::PhaseFinished { detail, .. } => println!("    ok: {detail}"),
            ReportEvent::PhaseFailed { phase, error } => {
                eprintln!("    error: {phase} failed: {error}")
            }
            ReportEvent::Metadata(notice) if notice.is_warning() => println!("    ! {notice}"),
            ReportEvent::Metadata(notice) => println!("    - {notice}"),
            ReportEvent::EpisodeListed {
                position,
                source,
                title,
            } => {
                let label = episode_label(title.as_deref().unwrap_or("(untitled)"), TITLE_WIDTH);
                let tag = source.to_string().to_uppercase();
                println!("    {position:>4}. [{tag}] {label}");
            }
            ReportEvent::Warning(message) => println!("    ! {message}"),
            ReportEvent::Finished(summary) => {
                println!();
                println!("Merged feed written to {}", summary.output_path.display());
                println!("    total:   {} episodes", summary.total);
                println!(
                    "    current: {} episodes ({} kept)",
                    summary.current_items, summary.from_current
                );
                println!(
                    "    legacy:  {} episodes ({} kept)",
                    summary.legacy_items, summary.from_legacy
                );
                if !summary.formatted {
                    println!("    note: output left unformatted");
                }
            }
        }
    }
}

/// Keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phases that reported a failure.
    pub fn failed_phases(&self) -> Vec<Phase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::PhaseFailed { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    pub fn started_phases(&self) -> Vec<Phase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::PhaseStarted(phase) => Some(*phase),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&mut self, event: ReportEvent) {
        self.events.push(event);
    }
}
